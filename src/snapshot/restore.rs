// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Snapshot restore (`rollback` command).

use crate::cache;
use crate::container::database::Database;
use crate::error::{TierError, TierResult};
use crate::snapshot::{database_files, ensure_unlocked, shadow_prefix};
use crate::vfs::DiskStore;
use log::info;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Restores the connected database from its shadow copies.
///
/// Closes the current connection, replaces every file of the database
/// with the snapshot state, drops all cached containers without
/// write-back, reloads the database, and reassigns the caller's
/// connection.
///
/// ## Input
/// - `store`: Content store
/// - `shadow_dir`: Shadow directory name under the store root
/// - `connection`: Connection slot; must hold a database
///
/// ## Output
/// - `Ok(())`: Connection points at the restored database
/// - `Err(TierError::SnapshotMissing)`: No snapshot for this database
/// - `Err(TierError::LockUnavailable)`: A participating container holds
///   a write lock
pub fn rollback(
    store: &DiskStore,
    shadow_dir: &str,
    connection: &mut Option<Arc<Mutex<Database>>>,
) -> TierResult<()> {
    let current = connection.as_ref().ok_or_else(|| TierError::NotFound {
        kind: "Database",
        name: "<no connection>".to_string(),
    })?;

    let name = {
        let guard = current.lock().unwrap_or_else(|e| e.into_inner());
        ensure_unlocked(&guard)?;
        guard.name()
    };

    let prefix = shadow_prefix(shadow_dir, &name);
    let shadow_root = store.resolve(&prefix);
    if !shadow_root.is_dir() {
        return Err(TierError::SnapshotMissing {
            database: name.to_string(),
        });
    }

    // Enumerate the live files before anything is torn down; files born
    // after the snapshot are removed by the replacement below.
    let live_files = database_files(store, &name).unwrap_or_default();

    // Close the connection and drop every cached body unsaved: rollback
    // discards in-memory state.
    *connection = None;
    cache::global().discard_all();

    for file in &live_files {
        let _ = store.delete(file);
    }

    let mut restored = 0usize;
    copy_tree(&shadow_root, &shadow_root, store, &mut restored)?;

    let database = Database::load(store, &name)?;
    *connection = Some(database);

    info!(
        "Database [{}] rolled back from snapshot ({} files restored)",
        name, restored
    );
    Ok(())
}

/// Copies every file under the shadow root back to its live location,
/// preserving store-relative paths.
fn copy_tree(
    root: &Path,
    current: &Path,
    store: &DiskStore,
    restored: &mut usize,
) -> TierResult<()> {
    let entries = std::fs::read_dir(current).map_err(|e| TierError::IoError {
        operation: "read_shadow_dir".to_string(),
        reason: format!("{}: {}", current.display(), e),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| TierError::IoError {
            operation: "read_shadow_entry".to_string(),
            reason: e.to_string(),
        })?;
        let path = entry.path();

        if path.is_dir() {
            copy_tree(root, &path, store, restored)?;
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .map_err(|e| TierError::IoError {
                operation: "resolve_shadow_path".to_string(),
                reason: e.to_string(),
            })?
            .to_string_lossy()
            .replace('\\', "/");

        if rel == "SNAPSHOT.meta" {
            continue;
        }

        let target = store.resolve(&rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TierError::IoError {
                operation: "create_restore_dir".to_string(),
                reason: format!("{}: {}", parent.display(), e),
            })?;
        }
        std::fs::copy(&path, &target).map_err(|e| TierError::IoError {
            operation: "restore_content".to_string(),
            reason: format!("{} -> {}: {}", path.display(), target.display(), e),
        })?;
        *restored += 1;
    }

    Ok(())
}
