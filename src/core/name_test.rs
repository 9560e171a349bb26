// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for fixed-width container names.

use crate::core::name::{ShortName, NAME_SIZE};
use crate::error::TierError;

#[test]
fn test_new_uppercases_and_pads() {
    let name = ShortName::new("lib").unwrap();
    assert_eq!(name.as_str(), "LIB");
    assert_eq!(&name.as_bytes()[..4], b"LIB\0");
}

#[test]
fn test_new_truncates_to_stem_width() {
    let name = ShortName::new("verylongtablename").unwrap();
    assert_eq!(name.as_str().len(), NAME_SIZE);
    assert_eq!(name.as_str(), "VERYLONG");
}

#[test]
fn test_new_rejects_empty() {
    assert!(matches!(
        ShortName::new(""),
        Err(TierError::ParseError { .. })
    ));
}

#[test]
fn test_new_rejects_invalid_characters() {
    assert!(ShortName::new("a/b").is_err());
    assert!(ShortName::new("sp ace").is_err());
}

#[test]
fn test_round_trip_through_bytes() {
    let name = ShortName::new("books").unwrap();
    let restored = ShortName::from_bytes(*name.as_bytes());
    assert_eq!(name, restored);
    assert_eq!(restored.as_str(), "BOOKS");
}

#[test]
fn test_random_is_full_width() {
    let name = ShortName::random();
    assert_eq!(name.as_str().len(), NAME_SIZE);
    assert!(!name.is_empty());
}

#[test]
fn test_matches_normalised_input() {
    let name = ShortName::new("books").unwrap();
    assert!(name.matches("books"));
    assert!(name.matches("BOOKS"));
    assert!(!name.matches("pages"));
}

#[test]
fn test_default_is_empty() {
    assert!(ShortName::default().is_empty());
}
