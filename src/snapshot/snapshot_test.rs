// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for snapshot creation and rollback.

use crate::cache;
use crate::concurrent::lock::current_worker;
use crate::container::column::compile_columns;
use crate::container::database::Database;
use crate::container::table::Table;
use crate::container::TABLE_BASE;
use crate::core::name::ShortName;
use crate::error::TierError;
use crate::snapshot::{init_transaction, rollback};
use crate::vfs::DiskStore;
use serial_test::serial;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const SHADOW: &str = "shadow";

fn row(tag: u8) -> Vec<u8> {
    vec![tag; 1024]
}

/// Creates a connected database "lib" with table "books" and two rows.
fn fixture() -> (TempDir, DiskStore, Arc<Mutex<Database>>) {
    let temp = TempDir::new().unwrap();
    let store = DiskStore::new(temp.path()).unwrap();
    cache::global().discard_all();

    let db_name = ShortName::new("lib").unwrap();
    let mut db = Database::create(db_name);
    db.save(&store).unwrap();
    drop(db);

    let connection = Database::load(&store, &db_name).unwrap();
    {
        let columns = compile_columns(
            &["a", "512", "any", "np", "na", "b", "512", "any", "np", "na"]
                .map(String::from),
        )
        .unwrap();
        let table = Table::create(ShortName::new("books").unwrap(), columns).unwrap();
        let table_name = table.name();
        cache::global().tables.add(&store, TABLE_BASE, table);

        let mut guard = connection.lock().unwrap();
        guard.link_table(table_name).unwrap();
        guard.append_row(&store, "books", &row(1)).unwrap();
        guard.append_row(&store, "books", &row(2)).unwrap();
    }

    (temp, store, connection)
}

#[test]
#[serial]
fn test_init_transaction_captures_all_files() {
    let (_temp, store, connection) = fixture();

    let captured = init_transaction(&store, SHADOW, &connection).unwrap();
    // Database + table + directory + page.
    assert_eq!(captured, 4);
    assert!(store.exists("shadow/LIB/db/LIB.tdb"));
    assert!(store.exists("shadow/LIB/tab/BOOKS.ttb"));
    assert!(store.resolve("shadow/LIB/SNAPSHOT.meta").exists());
}

#[test]
#[serial]
fn test_init_transaction_persists_before_copy() {
    let (_temp, store, connection) = fixture();

    init_transaction(&store, SHADOW, &connection).unwrap();
    // The barrier wrote the table file even though nothing flushed it
    // explicitly before.
    assert!(store.exists("tab/BOOKS.ttb"));
}

#[test]
#[serial]
fn test_rollback_restores_flushed_state() {
    let (_temp, store, connection) = fixture();
    init_transaction(&store, SHADOW, &connection).unwrap();

    {
        let guard = connection.lock().unwrap();
        guard.insert_row(&store, "books", 0, &row(9)).unwrap();
        guard.delete_row(&store, "books", 1).unwrap();
    }
    {
        let mut guard = connection.lock().unwrap();
        guard.append_row(&store, "books", &row(3)).unwrap();
    }

    let mut slot = Some(connection);
    rollback(&store, SHADOW, &mut slot).unwrap();
    let restored = slot.unwrap();

    let guard = restored.lock().unwrap();
    assert_eq!(guard.get_row(&store, "books", 0).unwrap(), row(1));
    assert_eq!(guard.get_row(&store, "books", 1).unwrap(), row(2));
    assert!(matches!(
        guard.get_row(&store, "books", 2),
        Err(TierError::RowNotFound { .. })
    ));
}

#[test]
#[serial]
fn test_rollback_without_snapshot() {
    let (_temp, store, connection) = fixture();

    let mut slot = Some(connection);
    let result = rollback(&store, SHADOW, &mut slot);
    assert!(matches!(result, Err(TierError::SnapshotMissing { .. })));
}

#[test]
#[serial]
fn test_rollback_without_connection() {
    let temp = TempDir::new().unwrap();
    let store = DiskStore::new(temp.path()).unwrap();
    cache::global().discard_all();

    let mut slot = None;
    let result = rollback(&store, SHADOW, &mut slot);
    assert!(matches!(result, Err(TierError::NotFound { .. })));
}

#[test]
#[serial]
fn test_init_transaction_refuses_locked_containers() {
    let (_temp, store, connection) = fixture();

    {
        let guard = connection.lock().unwrap();
        // A foreign worker holds the write lock.
        assert!(guard.lock.require_write(current_worker() + 1));
    }

    let result = init_transaction(&store, SHADOW, &connection);
    assert!(matches!(result, Err(TierError::LockUnavailable { .. })));
}
