// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Snapshot creation (`flush` command).

use crate::cache;
use crate::container::database::Database;
use crate::error::{TierError, TierResult};
use crate::snapshot::{database_files, ensure_unlocked, shadow_prefix};
use crate::vfs::DiskStore;
use chrono::Utc;
use log::info;
use std::sync::{Arc, Mutex};

/// Persists every container reachable from the connected database, then
/// copies all of its files to the shadow prefix.
///
/// ## Input
/// - `store`: Content store
/// - `shadow_dir`: Shadow directory name under the store root
/// - `connection`: Connected database
///
/// ## Output
/// - `Ok(n)`: Files captured in the snapshot
/// - `Err(TierError::LockUnavailable)`: A participating container holds
///   a write lock
///
/// ## Ordering Guarantee
/// Acts as a global barrier: every container modified before the call is
/// persisted before the call returns.
pub fn init_transaction(
    store: &DiskStore,
    shadow_dir: &str,
    connection: &Arc<Mutex<Database>>,
) -> TierResult<usize> {
    let name = {
        let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
        ensure_unlocked(&guard)?;
        guard.name()
    };

    // Write-back barrier, leaves first; the connected database itself
    // stays registered and is saved through its own handle.
    let classes = cache::global();
    classes.pages.free(store)?;
    classes.directories.free(store)?;
    classes.tables.free(store)?;
    {
        let mut guard = connection.lock().unwrap_or_else(|e| e.into_inner());
        guard.save(store)?;
    }

    let files = database_files(store, &name)?;
    let prefix = shadow_prefix(shadow_dir, &name);

    // Replace any previous snapshot wholesale.
    let shadow_root = store.resolve(&prefix);
    if shadow_root.exists() {
        std::fs::remove_dir_all(&shadow_root).map_err(|e| TierError::IoError {
            operation: "clear_shadow".to_string(),
            reason: format!("{}: {}", shadow_root.display(), e),
        })?;
    }

    for file in &files {
        if let Err(e) = store.copy(file, &format!("{}/{}", prefix, file)) {
            // A torn snapshot must not masquerade as a valid one.
            let _ = std::fs::remove_dir_all(&shadow_root);
            return Err(e);
        }
    }

    let stamp = Utc::now().to_rfc3339();
    std::fs::write(shadow_root.join("SNAPSHOT.meta"), format!("{}\n", stamp)).map_err(|e| {
        TierError::IoError {
            operation: "write_snapshot_meta".to_string(),
            reason: e.to_string(),
        }
    })?;

    info!(
        "Snapshot of database [{}] captured ({} files) at {}",
        name,
        files.len(),
        stamp
    );
    Ok(files.len())
}
