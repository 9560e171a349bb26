// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Keyed registry of live containers with write-back eviction.
//!
//! Entries are keyed by (name, base path). Every entry holds a shared
//! handle to the container; pinning is implicit in the handle count, so an
//! entry some caller still references is never evicted. Write-back runs
//! the container's save path, which is itself gated on checksum equality.

use crate::core::config::CacheCapacities;
use crate::core::name::ShortName;
use crate::error::{TierError, TierResult};
use crate::vfs::DiskStore;
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Write-back contract for cacheable containers.
pub trait Cached: Send + 'static {
    /// Container kind label used in log and error output.
    const KIND: &'static str;

    /// Name the entity is registered under.
    fn cache_name(&self) -> ShortName;

    /// Persists the entity; called on eviction and explicit flush. The
    /// save path updates the stored checksum, hence the mutable receiver.
    fn write_back(&mut self, store: &DiskStore) -> TierResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    name: ShortName,
    base: String,
}

struct Slot<T> {
    entity: Arc<Mutex<T>>,
    last_used: u64,
}

/// One cache class: a bounded registry for a single container kind.
pub struct CacheClass<T: Cached> {
    capacity: AtomicUsize,
    ticks: AtomicU64,
    slots: Mutex<HashMap<CacheKey, Slot<T>>>,
    load_section: Mutex<()>,
}

impl<T: Cached> CacheClass<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: AtomicUsize::new(capacity),
            ticks: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
            load_section: Mutex::new(()),
        }
    }

    /// Rebinds the eviction bound.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    /// Serialises container loads for this class.
    ///
    /// Hold the returned guard across the read-construct-register
    /// sequence; `find` hits stay outside the section.
    pub fn load_section(&self) -> MutexGuard<'_, ()> {
        self.load_section.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Looks up a registered entity and bumps its usage stamp.
    pub fn find(&self, name: &ShortName, base: &str) -> Option<Arc<Mutex<T>>> {
        let key = CacheKey {
            name: *name,
            base: base.to_string(),
        };

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots.get_mut(&key)?;
        slot.last_used = self.ticks.fetch_add(1, Ordering::Relaxed);
        Some(Arc::clone(&slot.entity))
    }

    /// True when the entity is registered, written or not.
    pub fn contains(&self, name: &ShortName, base: &str) -> bool {
        let key = CacheKey {
            name: *name,
            base: base.to_string(),
        };
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.contains_key(&key)
    }

    /// Registers an entity, evicting the least-recently-used unpinned
    /// entry when the class is at capacity.
    ///
    /// ## Output
    /// - Shared handle to the registered entity (the already-registered
    ///   one when the key was taken in the meantime)
    pub fn add(&self, store: &DiskStore, base: &str, entity: T) -> Arc<Mutex<T>> {
        let key = CacheKey {
            name: entity.cache_name(),
            base: base.to_string(),
        };

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get(&key) {
            return Arc::clone(&slot.entity);
        }

        let capacity = self.capacity.load(Ordering::Relaxed);
        while slots.len() >= capacity {
            if !self.evict_one(store, &mut slots) {
                warn!(
                    "{} cache over capacity ({} entries, all pinned or dirty)",
                    T::KIND,
                    slots.len()
                );
                break;
            }
        }

        let handle = Arc::new(Mutex::new(entity));
        slots.insert(
            key,
            Slot {
                entity: Arc::clone(&handle),
                last_used: self.ticks.fetch_add(1, Ordering::Relaxed),
            },
        );
        handle
    }

    /// Removes an entity from the registry and writes it back.
    ///
    /// ## Output
    /// - `Err(TierError::NotCached)`: Not registered; the caller performs
    ///   a direct flush instead
    /// - `Err(_)`: Write-back failed; the entry stays registered for
    ///   retry
    pub fn flush(&self, store: &DiskStore, name: &ShortName, base: &str) -> TierResult<()> {
        let key = CacheKey {
            name: *name,
            base: base.to_string(),
        };

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots.get(&key).ok_or_else(|| TierError::NotCached {
            name: name.to_string(),
        })?;

        let entity = Arc::clone(&slot.entity);
        let result = {
            let mut guard = entity.lock().unwrap_or_else(|e| e.into_inner());
            guard.write_back(store)
        };

        match result {
            Ok(()) => {
                slots.remove(&key);
                Ok(())
            }
            Err(e) => {
                error!("{} [{}] write-back failed: {}", T::KIND, name, e);
                Err(e)
            }
        }
    }

    /// Drops an entity without write-back. Rollback path only.
    pub fn drop_entry(&self, name: &ShortName, base: &str) {
        let key = CacheKey {
            name: *name,
            base: base.to_string(),
        };
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(&key);
    }

    /// Evicts every entry with write-back. Entries whose save fails stay
    /// registered and are reported through the result.
    pub fn free(&self, store: &DiskStore) -> TierResult<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let keys: Vec<CacheKey> = slots.keys().cloned().collect();

        let mut first_error = None;
        for key in keys {
            if let Some(slot) = slots.get(&key) {
                let entity = Arc::clone(&slot.entity);
                let mut guard = entity.lock().unwrap_or_else(|e| e.into_inner());
                match guard.write_back(store) {
                    Ok(()) => {
                        drop(guard);
                        slots.remove(&key);
                    }
                    Err(e) => {
                        error!("{} [{}] write-back failed: {}", T::KIND, key.name, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Drops every entry without write-back. Rollback path only.
    pub fn discard(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.clear();
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.len()
    }

    /// True when no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_one(&self, store: &DiskStore, slots: &mut HashMap<CacheKey, Slot<T>>) -> bool {
        let mut candidates: Vec<(CacheKey, u64)> = slots
            .iter()
            .filter(|(_, slot)| Arc::strong_count(&slot.entity) == 1)
            .map(|(key, slot)| (key.clone(), slot.last_used))
            .collect();
        candidates.sort_by_key(|(_, last_used)| *last_used);

        for (key, _) in candidates {
            let entity = Arc::clone(&slots[&key].entity);
            let result = {
                let mut guard = entity.lock().unwrap_or_else(|e| e.into_inner());
                guard.write_back(store)
            };

            match result {
                Ok(()) => {
                    debug!("{} [{}] evicted", T::KIND, key.name);
                    slots.remove(&key);
                    return true;
                }
                Err(e) => {
                    // A dirty entry that cannot be saved stays registered.
                    error!("{} [{}] eviction save failed: {}", T::KIND, key.name, e);
                }
            }
        }
        false
    }
}

/// The four cache classes, one per container kind.
pub struct GlobalCache {
    pub databases: CacheClass<crate::container::Database>,
    pub tables: CacheClass<crate::container::Table>,
    pub directories: CacheClass<crate::container::Directory>,
    pub pages: CacheClass<crate::container::Page>,
}

impl GlobalCache {
    /// Applies configured capacities.
    pub fn configure(&self, caps: &CacheCapacities) {
        self.databases.set_capacity(caps.databases);
        self.tables.set_capacity(caps.tables);
        self.directories.set_capacity(caps.directories);
        self.pages.set_capacity(caps.pages);
    }

    /// Probe across every class: does any kind hold this (name, base)?
    ///
    /// Used by existence checks so a cached-but-unwritten entity counts
    /// as existing.
    pub fn contains_any(&self, name: &ShortName, base: &str) -> bool {
        self.databases.contains(name, base)
            || self.tables.contains(name, base)
            || self.directories.contains(name, base)
            || self.pages.contains(name, base)
    }

    /// Evicts everything with write-back, leaves-first so parents observe
    /// final child state.
    pub fn flush_all(&self, store: &DiskStore) -> TierResult<()> {
        self.pages.free(store)?;
        self.directories.free(store)?;
        self.tables.free(store)?;
        self.databases.free(store)
    }

    /// Drops everything without write-back. Rollback path only.
    pub fn discard_all(&self) {
        self.pages.discard();
        self.directories.discard();
        self.tables.discard();
        self.databases.discard();
    }
}

static GLOBAL: Lazy<GlobalCache> = Lazy::new(|| {
    let caps = CacheCapacities::default();
    GlobalCache {
        databases: CacheClass::new(caps.databases),
        tables: CacheClass::new(caps.tables),
        directories: CacheClass::new(caps.directories),
        pages: CacheClass::new(caps.pages),
    }
});

/// Process-wide cache instance.
pub fn global() -> &'static GlobalCache {
    &GLOBAL
}
