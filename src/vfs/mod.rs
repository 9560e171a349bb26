// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! File-system façade.
//!
//! Wraps the underlying block-addressable file system behind numbered
//! content handles: open or create content, read and write at byte
//! offsets, delete, existence check. All container I/O goes through this
//! layer; nothing above it touches `std::fs` for data files.

pub mod store;


// Re-export public API
pub use store::{Content, DiskStore, OpenMode};
