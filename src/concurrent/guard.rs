// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Single-process data-directory guard.
//!
//! The engine supports one process per data directory. An advisory file
//! lock (RAII - auto-releases on drop) turns a second process into a clean
//! error instead of silent corruption.

use crate::error::{TierError, TierResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Data-directory lock handle (RAII).
///
/// The lock is automatically released when this struct is dropped.
pub struct ProcessGuard {
    file: File,
    path: PathBuf,
}

/// Acquires the exclusive data-directory lock.
///
/// ## Input
/// - `data_dir`: Engine data directory
///
/// ## Output
/// - `Ok(ProcessGuard)`: Lock handle
/// - `Err(TierError::LockUnavailable)`: Another process holds the
///   directory
/// - `Err(TierError::IoError)`: Cannot create the lock file
pub fn acquire_guard(data_dir: &Path) -> TierResult<ProcessGuard> {
    std::fs::create_dir_all(data_dir).map_err(|e| TierError::IoError {
        operation: "create_data_dir".to_string(),
        reason: format!("{}: {}", data_dir.display(), e),
    })?;

    let path = data_dir.join("engine.lock");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&path)
        .map_err(|e| TierError::IoError {
            operation: "create_lock_file".to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;

    file.try_lock_exclusive()
        .map_err(|_| TierError::LockUnavailable {
            kind: "Store",
            name: data_dir.display().to_string(),
            worker: 0,
        })?;

    Ok(ProcessGuard { file, path })
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}
