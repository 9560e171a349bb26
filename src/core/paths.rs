// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Path construction utilities for tierbase.
//!
//! Centralised path management to ensure consistency across the codebase.
//! Container files live at `<base>/<NAME>.<ext>` relative to the store
//! root; the stem is already 8.3-normalised by [`ShortName`].

use crate::core::name::ShortName;
use crate::error::{TierError, TierResult};

/// Candidate budget for unique-name generation.
pub const UNIQUE_NAME_ATTEMPTS: usize = 64;

/// Builds the store-relative path of a container file.
///
/// ## Input
/// - `base`: Base directory of the container kind (or the parent
///   directory stem for pages)
/// - `name`: Container stem
/// - `ext`: File extension (at most 3 characters)
///
/// ## Output
/// - Store-relative path, e.g. `tab/BOOKS.ttb`
///
/// ## Example
/// ```
/// use tierbase::core::{container_path, ShortName};
///
/// let name = ShortName::new("books").unwrap();
/// assert_eq!(container_path("tab", &name, "ttb"), "tab/BOOKS.ttb");
/// ```
pub fn container_path(base: &str, name: &ShortName, ext: &str) -> String {
    debug_assert!(ext.len() <= 3, "extension exceeds 8.3 form");
    format!("{}/{}.{}", base, name, ext)
}

/// Generates a container name that is not taken under `base`.
///
/// Iterates randomised candidates and hands each to the supplied existence
/// probe. The probe must treat cached-but-unwritten entities as existing.
///
/// ## Input
/// - `base`: Base directory, used only for error context
/// - `exists`: Existence probe over candidate stems
///
/// ## Output
/// - `Ok(ShortName)`: Free stem
/// - `Err(TierError::NameExhausted)`: No free stem within
///   [`UNIQUE_NAME_ATTEMPTS`] candidates
pub fn unique_name<F>(base: &str, exists: F) -> TierResult<ShortName>
where
    F: Fn(&ShortName) -> bool,
{
    for _ in 0..UNIQUE_NAME_ATTEMPTS {
        let candidate = ShortName::random();
        if !exists(&candidate) {
            return Ok(candidate);
        }
    }

    Err(TierError::NameExhausted {
        base: base.to_string(),
    })
}
