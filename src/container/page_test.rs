// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the page container.

use crate::cache;
use crate::container::page::Page;
use crate::container::{PAGE_CONTENT_SIZE, PAGE_EMPTY};
use crate::core::name::ShortName;
use crate::error::TierError;
use crate::vfs::DiskStore;
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

const ROW: usize = 1024;

fn fixture() -> (TempDir, DiskStore) {
    let temp = TempDir::new().unwrap();
    let store = DiskStore::new(temp.path()).unwrap();
    (temp, store)
}

fn page(name: &str) -> Page {
    Page::create(
        ShortName::new(name).unwrap(),
        ShortName::new("d1").unwrap(),
    )
}

fn row(tag: u8) -> Vec<u8> {
    vec![tag; ROW]
}

#[test]
fn test_append_places_rows_in_order() {
    let mut page = page("p1");
    for i in 0..4u8 {
        assert_eq!(page.append(&row(i + 1)).unwrap(), i as usize);
    }
    assert_eq!(page.occupied_slots(ROW), 4);
}

#[test]
fn test_append_full_page() {
    let mut page = page("p2");
    for i in 0..(PAGE_CONTENT_SIZE / ROW) as u8 {
        page.append(&row(i + 1)).unwrap();
    }

    let result = page.append(&row(9));
    assert!(matches!(result, Err(TierError::CapacityExceeded { .. })));
}

#[test]
fn test_delete_then_append_reuses_slot() {
    let mut page = page("p3");
    page.append(&row(1)).unwrap();
    page.append(&row(2)).unwrap();
    page.append(&row(3)).unwrap();

    page.delete(1, ROW).unwrap();
    assert_eq!(page.get(1, ROW).unwrap()[0], PAGE_EMPTY);

    // The tombstone is reused before a fresh slot is allocated.
    assert_eq!(page.append(&row(9)).unwrap(), 1);
    assert_eq!(page.get(1, ROW).unwrap(), row(9));
    assert_eq!(page.occupied_slots(ROW), 3);
}

#[test]
fn test_get_beyond_high_water_mark() {
    let mut page = page("p4");
    page.append(&row(1)).unwrap();
    assert!(matches!(
        page.get(1, ROW),
        Err(TierError::RowNotFound { .. })
    ));
}

#[test]
fn test_insert_is_unconditional_and_extends() {
    let mut page = page("p5");
    page.insert(2, &row(7)).unwrap();
    assert_eq!(page.occupied_slots(ROW), 3);
    assert_eq!(page.get(2, ROW).unwrap(), row(7));
}

#[test]
fn test_delete_beyond_high_water_mark() {
    let mut page = page("p6");
    assert!(matches!(
        page.delete(0, ROW),
        Err(TierError::RowNotFound { .. })
    ));
}

#[test]
fn test_checksum_is_pure() {
    let mut page = page("p7");
    page.append(&row(1)).unwrap();

    let stored_before = page.header.checksum;
    let a = page.get_checksum();
    let b = page.get_checksum();
    assert_eq!(a, b);
    assert_eq!(page.header.checksum, stored_before);
}

#[test]
#[serial]
fn test_save_load_round_trip() {
    let (_temp, store) = fixture();
    cache::global().discard_all();

    let mut page = page("rt1");
    page.append(&row(1)).unwrap();
    page.append(&row(2)).unwrap();
    page.delete(0, ROW).unwrap();
    page.save(&store).unwrap();

    let owner = ShortName::new("d1").unwrap();
    let name = ShortName::new("rt1").unwrap();
    let loaded = Page::load(&store, &owner, &name).unwrap();
    let guard = loaded.lock().unwrap();

    assert_eq!(guard.header.magic, page.header.magic);
    assert_eq!(guard.header.name, page.header.name);
    assert_eq!(guard.header.content_len, page.header.content_len);
    assert_eq!(guard.header.checksum, page.header.checksum);
    assert_eq!(guard.get(0, ROW).unwrap()[0], PAGE_EMPTY);
    assert_eq!(guard.get(1, ROW).unwrap(), row(2));
}

#[test]
#[serial]
fn test_save_optimization_skips_unchanged() {
    let (_temp, store) = fixture();
    cache::global().discard_all();

    let mut page = page("so1");
    page.append(&row(1)).unwrap();
    page.save(&store).unwrap();

    // Remove the file behind the engine's back: an unchanged checksum
    // must skip all I/O and leave the file absent.
    let path = Page::file_path(&page.owner, &page.header.name);
    store.delete(&path).unwrap();
    page.save(&store).unwrap();
    assert!(!store.exists(&path));

    page.append(&row(2)).unwrap();
    page.save(&store).unwrap();
    assert!(store.exists(&path));
}

#[test]
#[serial]
fn test_load_deduplicates_through_cache() {
    let (_temp, store) = fixture();
    cache::global().discard_all();

    let mut page = page("dd1");
    page.append(&row(1)).unwrap();
    page.save(&store).unwrap();

    let owner = ShortName::new("d1").unwrap();
    let name = ShortName::new("dd1").unwrap();
    let first = Page::load(&store, &owner, &name).unwrap();

    // Second load must come from the registry even with the file gone.
    store.delete(&Page::file_path(&owner, &name)).unwrap();
    let second = Page::load(&store, &owner, &name).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
#[serial]
fn test_load_rejects_wrong_magic() {
    let (temp, store) = fixture();
    cache::global().discard_all();

    let mut page = page("bm1");
    page.append(&row(1)).unwrap();
    page.save(&store).unwrap();

    let path = temp.path().join("D1").join("BM1.tpg");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();

    let owner = ShortName::new("d1").unwrap();
    let name = ShortName::new("bm1").unwrap();
    let result = Page::load(&store, &owner, &name);
    assert!(matches!(result, Err(TierError::InvalidMagic { .. })));
}

#[test]
#[serial]
fn test_load_rejects_corrupt_content() {
    let (temp, store) = fixture();
    cache::global().discard_all();

    let mut page = page("cc1");
    page.append(&row(1)).unwrap();
    page.save(&store).unwrap();

    // Flip a content byte past the header; the checksum must catch it.
    let path = temp.path().join("D1").join("CC1.tpg");
    let mut bytes = std::fs::read(&path).unwrap();
    let offset = bytes.len() - 2;
    bytes[offset] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();

    let owner = ShortName::new("d1").unwrap();
    let name = ShortName::new("cc1").unwrap();
    let result = Page::load(&store, &owner, &name);
    assert!(matches!(result, Err(TierError::ChecksumMismatch { .. })));
}
