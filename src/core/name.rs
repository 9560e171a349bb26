// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width container names.
//!
//! Every persisted entity is addressed by an 8-character short-name stem,
//! upper-cased and NUL-padded on disk. The stem doubles as the file name
//! under the container's base directory.

use crate::error::{TierError, TierResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use uuid::Uuid;

/// Width of a container name stem in bytes.
pub const NAME_SIZE: usize = 8;

/// Accepted characters for a normalised stem.
static STEM_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9_]{1,8}$").unwrap());

/// Fixed-width container name.
///
/// Stored as exactly [`NAME_SIZE`] bytes, NUL-padded. Comparison and
/// hashing are byte-exact, so a name round-trips bit-for-bit through the
/// on-disk header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShortName([u8; NAME_SIZE]);

impl ShortName {
    /// Normalises a user-supplied name into a short stem.
    ///
    /// ## Input
    /// - `raw`: Any name; lower-case is folded, anything past
    ///   [`NAME_SIZE`] characters is truncated (8.3 discipline)
    ///
    /// ## Output
    /// - `Ok(ShortName)`: Normalised stem
    /// - `Err(TierError::ParseError)`: Empty name or invalid characters
    ///
    /// ## Example
    /// ```
    /// use tierbase::core::ShortName;
    ///
    /// let name = ShortName::new("books").unwrap();
    /// assert_eq!(name.as_str(), "BOOKS");
    /// ```
    pub fn new(raw: &str) -> TierResult<Self> {
        let stem: String = raw
            .trim()
            .chars()
            .take(NAME_SIZE)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if !STEM_PATTERN.is_match(&stem) {
            return Err(TierError::ParseError {
                reason: format!("invalid container name [{}]", raw),
            });
        }

        let mut bytes = [0u8; NAME_SIZE];
        bytes[..stem.len()].copy_from_slice(stem.as_bytes());
        Ok(ShortName(bytes))
    }

    /// Reconstructs a name from its on-disk representation.
    pub fn from_bytes(bytes: [u8; NAME_SIZE]) -> Self {
        ShortName(bytes)
    }

    /// Generates a randomised candidate stem (8 hex characters).
    pub fn random() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        let mut bytes = [0u8; NAME_SIZE];
        bytes.copy_from_slice(&hex.as_bytes()[..NAME_SIZE]);
        ShortName(bytes)
    }

    /// On-disk byte representation (NUL-padded).
    pub fn as_bytes(&self) -> &[u8; NAME_SIZE] {
        &self.0
    }

    /// Stem without padding.
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(NAME_SIZE);
        // Stems are constructed from ASCII only.
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }

    /// True when the name holds no characters (unoccupied slot).
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// True when this stem matches a raw user-supplied name after
    /// normalisation.
    pub fn matches(&self, raw: &str) -> bool {
        ShortName::new(raw).map(|n| n == *self).unwrap_or(false)
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName({})", self.as_str())
    }
}
