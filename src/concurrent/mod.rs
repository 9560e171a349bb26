// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Concurrency primitives.
//!
//! Two disciplines protect shared state: the per-container lock keyed by
//! worker identifier (non-blocking, failure propagates upward) and an
//! advisory file lock on the data directory enforcing single-process
//! access.

pub mod guard;
pub mod lock;


#[cfg(test)]
#[path = "lock_test.rs"]
mod lock_test;

// Re-export public API
pub use guard::{acquire_guard, ProcessGuard};
pub use lock::{current_worker, ContainerLock, WorkerId};
