// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Symmetric byte-widening codec.
//!
//! Each source byte is widened into one [`SYMBOL_WIDTH`]-byte symbol on the
//! way to disk and narrowed back on the way in. The low byte of a symbol
//! carries the data; the high byte is reserved for the error-correcting
//! expansion applied by the underlying file-system layer and is ignored on
//! decode. Callers treat pack/unpack as black boxes sized by the source
//! byte count.

use crate::error::{TierError, TierResult};

/// Expansion factor of the codec: bytes on disk per source byte.
pub const SYMBOL_WIDTH: usize = 2;

/// On-disk length of `n` source bytes.
pub fn packed_len(n: usize) -> usize {
    n * SYMBOL_WIDTH
}

/// Widens `src` into its on-disk symbol stream.
///
/// ## Input
/// - `src`: Raw serialised bytes
///
/// ## Output
/// - Symbol stream of length `src.len() * SYMBOL_WIDTH`
pub fn pack(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packed_len(src.len()));
    for byte in src {
        let symbol = (*byte as u16).to_le_bytes();
        out.extend_from_slice(&symbol);
    }
    out
}

/// Narrows an on-disk symbol stream back into `n` source bytes.
///
/// ## Input
/// - `src`: Symbol stream, at least `n * SYMBOL_WIDTH` bytes
/// - `n`: Expected source byte count
///
/// ## Output
/// - `Ok(Vec<u8>)`: The `n` recovered bytes
/// - `Err(TierError::ParseError)`: Stream shorter than `n` symbols
pub fn unpack(src: &[u8], n: usize) -> TierResult<Vec<u8>> {
    if src.len() < packed_len(n) {
        return Err(TierError::ParseError {
            reason: format!(
                "packed stream truncated: {} bytes, expected {}",
                src.len(),
                packed_len(n)
            ),
        });
    }

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let symbol = u16::from_le_bytes([src[i * SYMBOL_WIDTH], src[i * SYMBOL_WIDTH + 1]]);
        out.push((symbol & 0x00ff) as u8);
    }
    Ok(out)
}
