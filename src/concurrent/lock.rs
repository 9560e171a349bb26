// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Per-container reader/writer exclusion.
//!
//! Each container carries one [`ContainerLock`] holding (owner worker-id,
//! reader count). Write acquisition is non-blocking: it succeeds when the
//! lock is unowned or already held in write mode by the same worker, and
//! fails otherwise. Read locks are shared and compatible with each other.
//! Callers report acquisition failure upward instead of waiting.

use std::sync::Mutex;

/// Small integer identifying a unit of work for lock ownership.
pub type WorkerId = usize;

/// Worker identifier of the calling thread.
///
/// Rayon pool threads map to `1..=N`; any thread outside the pool
/// (including the main thread) is worker `0`.
pub fn current_worker() -> WorkerId {
    rayon::current_thread_index().map(|i| i + 1).unwrap_or(0)
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<WorkerId>,
    readers: usize,
}

/// Per-container lock value.
///
/// Freshly constructed (and freshly loaded) containers start unowned.
#[derive(Debug, Default)]
pub struct ContainerLock {
    state: Mutex<LockState>,
}

impl ContainerLock {
    /// Attempts to take the write lock for `worker`.
    ///
    /// ## Output
    /// - `true`: Lock acquired (or re-entered by the owning worker)
    /// - `false`: Held by another worker or by active readers
    pub fn require_write(&self, worker: WorkerId) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.owner {
            Some(owner) => owner == worker,
            None => {
                if state.readers > 0 {
                    return false;
                }
                state.owner = Some(worker);
                true
            }
        }
    }

    /// Releases the write lock if `worker` holds it.
    pub fn release_write(&self, worker: WorkerId) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.owner == Some(worker) {
            state.owner = None;
        }
    }

    /// Attempts to take a shared read lock.
    ///
    /// Compatible with other readers and with a write lock held by the
    /// same worker.
    pub fn require_read(&self, worker: WorkerId) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.owner {
            Some(owner) if owner != worker => false,
            _ => {
                state.readers += 1;
                true
            }
        }
    }

    /// Releases one shared read lock.
    pub fn release_read(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.readers = state.readers.saturating_sub(1);
    }

    /// True while any worker holds the write lock.
    pub fn is_write_locked(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.owner.is_some()
    }
}
