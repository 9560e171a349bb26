// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the cache registry.
//!
//! Runs against a local cache class and a scratch container type so the
//! process-wide instance stays untouched.

use crate::cache::registry::{CacheClass, Cached};
use crate::core::name::ShortName;
use crate::error::{TierError, TierResult};
use crate::vfs::DiskStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

struct Probe {
    name: ShortName,
    saves: Arc<AtomicUsize>,
    fail_save: bool,
}

impl Probe {
    fn new(name: &str, saves: &Arc<AtomicUsize>) -> Self {
        Self {
            name: ShortName::new(name).unwrap(),
            saves: Arc::clone(saves),
            fail_save: false,
        }
    }
}

impl Cached for Probe {
    const KIND: &'static str = "Probe";

    fn cache_name(&self) -> ShortName {
        self.name
    }

    fn write_back(&mut self, _store: &DiskStore) -> TierResult<()> {
        if self.fail_save {
            return Err(TierError::IoError {
                operation: "probe_save".to_string(),
                reason: "simulated".to_string(),
            });
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fixture() -> (TempDir, DiskStore, Arc<AtomicUsize>) {
    let temp = TempDir::new().unwrap();
    let store = DiskStore::new(temp.path()).unwrap();
    (temp, store, Arc::new(AtomicUsize::new(0)))
}

#[test]
fn test_find_miss() {
    let class: CacheClass<Probe> = CacheClass::new(4);
    let name = ShortName::new("a").unwrap();
    assert!(class.find(&name, "tab").is_none());
}

#[test]
fn test_add_then_find_returns_same_entity() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(4);

    let added = class.add(&store, "tab", Probe::new("a", &saves));
    let name = ShortName::new("a").unwrap();
    let found = class.find(&name, "tab").unwrap();
    assert!(Arc::ptr_eq(&added, &found));
}

#[test]
fn test_add_same_key_deduplicates() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(4);

    let first = class.add(&store, "tab", Probe::new("a", &saves));
    let second = class.add(&store, "tab", Probe::new("a", &saves));
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(class.len(), 1);
}

#[test]
fn test_same_name_different_base_are_distinct() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(4);

    class.add(&store, "D1", Probe::new("p", &saves));
    class.add(&store, "D2", Probe::new("p", &saves));
    assert_eq!(class.len(), 2);
}

#[test]
fn test_eviction_writes_back_lru_unpinned() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(2);

    let pinned = class.add(&store, "tab", Probe::new("a", &saves));
    class.add(&store, "tab", Probe::new("b", &saves));
    class.add(&store, "tab", Probe::new("c", &saves));

    // "b" was the only unpinned candidate; "a" must survive.
    assert_eq!(saves.load(Ordering::SeqCst), 1);
    let name_a = ShortName::new("a").unwrap();
    let name_b = ShortName::new("b").unwrap();
    assert!(class.contains(&name_a, "tab"));
    assert!(!class.contains(&name_b, "tab"));
    drop(pinned);
}

#[test]
fn test_eviction_never_drops_pinned() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(1);

    let pinned = class.add(&store, "tab", Probe::new("a", &saves));
    class.add(&store, "tab", Probe::new("b", &saves));

    // Over capacity rather than dropping the pinned entry.
    assert_eq!(class.len(), 2);
    drop(pinned);
}

#[test]
fn test_flush_unknown_reports_not_cached() {
    let (_temp, store, _saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(4);
    let name = ShortName::new("zz").unwrap();

    let result = class.flush(&store, &name, "tab");
    assert!(matches!(result, Err(TierError::NotCached { .. })));
}

#[test]
fn test_flush_removes_and_saves() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(4);

    class.add(&store, "tab", Probe::new("a", &saves));
    let name = ShortName::new("a").unwrap();

    class.flush(&store, &name, "tab").unwrap();
    assert_eq!(saves.load(Ordering::SeqCst), 1);
    assert!(!class.contains(&name, "tab"));
}

#[test]
fn test_failed_write_back_keeps_entry() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(4);

    let mut probe = Probe::new("a", &saves);
    probe.fail_save = true;
    class.add(&store, "tab", probe);
    let name = ShortName::new("a").unwrap();

    assert!(class.flush(&store, &name, "tab").is_err());
    // Dirty entry remains registered for retry.
    assert!(class.contains(&name, "tab"));
}

#[test]
fn test_free_evicts_everything() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(8);

    class.add(&store, "tab", Probe::new("a", &saves));
    class.add(&store, "tab", Probe::new("b", &saves));
    class.free(&store).unwrap();
    assert!(class.is_empty());
    assert_eq!(saves.load(Ordering::SeqCst), 2);
}

#[test]
fn test_discard_skips_write_back() {
    let (_temp, store, saves) = fixture();
    let class: CacheClass<Probe> = CacheClass::new(8);

    class.add(&store, "tab", Probe::new("a", &saves));
    class.discard();
    assert_eq!(saves.load(Ordering::SeqCst), 0);
    assert!(class.is_empty());
}
