// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Container checksums.
//!
//! A 32-bit non-cryptographic hash over the serialised header (with its
//! checksum field zeroed by the caller) followed by the full-capacity
//! child-name array. Both sections feed one running hasher, so the result
//! combines the two in sequence and is bit-for-bit deterministic across
//! runs.

use crc32fast::Hasher;

/// Computes the combined checksum over a header and its child sections.
///
/// ## Input
/// - `sections`: Serialised byte sections, header (checksum zeroed) first,
///   then the entire child-name capacity, not just the occupied prefix
///
/// ## Output
/// - `u32`: Combined rolling hash over all sections in order
pub fn combined_checksum(sections: &[&[u8]]) -> u32 {
    let mut hasher = Hasher::new();
    for section in sections {
        hasher.update(section);
    }
    hasher.finalize()
}
