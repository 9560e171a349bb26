// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Global container cache.
//!
//! A process-wide registry of loaded containers, partitioned into one
//! cache class per container kind. Loads deduplicate through the registry,
//! eviction drives write-back, and a cached-but-unwritten entity counts as
//! existing for name-collision checks.
//!
//! ## Thread Safety
//!
//! - Each class guards its slot map with a mutex
//! - Loads are serialised per class through a dedicated critical section
//! - Eviction never drops a pinned (externally shared) entry

pub mod registry;

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;

// Re-export public API
pub use registry::{global, CacheClass, Cached, GlobalCache};
