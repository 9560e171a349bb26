// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Transaction snapshot and rollback.
//!
//! `init_transaction` acts as a global barrier: every container reachable
//! from the connected database is persisted, then all of its files are
//! copied to the shadow prefix. `rollback` restores the database from the
//! shadow copies and re-establishes the caller's connection. Both fail
//! when any participating container holds a write lock.

pub mod create;
pub mod restore;

#[cfg(test)]
mod snapshot_test;

// Re-export public API
pub use create::init_transaction;
pub use restore::rollback;

use crate::container::database::Database;
use crate::container::directory::Directory;
use crate::container::page::Page;
use crate::container::table::Table;
use crate::core::name::ShortName;
use crate::error::{TierError, TierResult};
use crate::vfs::DiskStore;

/// Shadow prefix for one database: `<shadow_dir>/<DBNAME>`.
pub(crate) fn shadow_prefix(shadow_dir: &str, database: &ShortName) -> String {
    format!("{}/{}", shadow_dir, database)
}

/// Every store-relative file belonging to a database, parents first:
/// the database file, each linked table file, each directory file, each
/// page file.
pub(crate) fn database_files(store: &DiskStore, name: &ShortName) -> TierResult<Vec<String>> {
    let mut files = vec![Database::file_path(name)];

    let database = Database::load(store, name)?;
    let table_names: Vec<ShortName> = {
        let guard = database.lock().unwrap_or_else(|e| e.into_inner());
        guard.tables().to_vec()
    };

    for table_name in table_names {
        files.push(Table::file_path(&table_name));

        let table = Table::load(store, &table_name)?;
        let dir_names: Vec<ShortName> = {
            let guard = table.lock().unwrap_or_else(|e| e.into_inner());
            guard.dir_names[..guard.header.dir_count as usize].to_vec()
        };

        for dir_name in dir_names {
            files.push(Directory::file_path(&dir_name));

            let directory = Directory::load(store, &dir_name)?;
            let guard = directory.lock().unwrap_or_else(|e| e.into_inner());
            for page_name in &guard.page_names[..guard.header.page_count as usize] {
                files.push(Page::file_path(&dir_name, page_name));
            }
        }
    }

    Ok(files)
}

/// Fails when the database or any cached container reachable from it
/// holds a write lock.
pub(crate) fn ensure_unlocked(database: &Database) -> TierResult<()> {
    let locked = |kind: &'static str, name: ShortName| TierError::LockUnavailable {
        kind,
        name: name.to_string(),
        worker: crate::concurrent::lock::current_worker(),
    };

    if database.lock.is_write_locked() {
        return Err(locked("Database", database.name()));
    }

    let classes = crate::cache::global();
    for table_name in database.tables() {
        if let Some(table) = classes.tables.find(table_name, crate::container::TABLE_BASE) {
            let guard = table.lock().unwrap_or_else(|e| e.into_inner());
            if guard.lock.is_write_locked() {
                return Err(locked("Table", *table_name));
            }

            for dir_name in &guard.dir_names[..guard.header.dir_count as usize] {
                if let Some(directory) = classes
                    .directories
                    .find(dir_name, crate::container::DIRECTORY_BASE)
                {
                    let dguard = directory.lock().unwrap_or_else(|e| e.into_inner());
                    if dguard.lock.is_write_locked() {
                        return Err(locked("Directory", *dir_name));
                    }
                }
            }
        }
    }

    Ok(())
}
