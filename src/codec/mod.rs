// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! On-disk byte codec and container checksums.
//!
//! Every serialised header and fixed-width name record passes through the
//! widening codec before reaching the file system, and the save path is
//! gated on a 32-bit checksum over the header plus the child-name array.

pub mod checksum;
pub mod pack;



// Re-export public API
pub use checksum::combined_checksum;
pub use pack::{pack, packed_len, unpack, SYMBOL_WIDTH};
