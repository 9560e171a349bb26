// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Database: ordered list of table names.
//!
//! The root of the containment hierarchy. Row-level operations resolve
//! the table by name (the name must be linked here) and delegate; full
//! deletes fan out over the linked tables in parallel.

use crate::cache::{self, Cached};
use crate::codec::{combined_checksum, pack, packed_len, unpack};
use crate::concurrent::lock::{current_worker, ContainerLock};
use crate::container::table::Table;
use crate::container::{
    flatten_names, DATABASE_BASE, DATABASE_EXT, DATABASE_MAGIC, TABLES_PER_DATABASE,
};
use crate::core::name::{ShortName, NAME_SIZE};
use crate::core::paths::container_path;
use crate::error::{TierError, TierResult};
use crate::vfs::{DiskStore, OpenMode};
use log::{debug, info};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// Database file header (version 1, little-endian).
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic ("TBDB")
/// 4       8     name (NUL-padded stem)
/// 12      2     table_count
/// 14      4     checksum
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DatabaseHeader {
    pub magic: u32,
    pub name: ShortName,
    pub table_count: u16,
    pub checksum: u32,
}

impl DatabaseHeader {
    /// Serialised header size in bytes, before codec widening.
    pub const SIZE: usize = 18;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..12].copy_from_slice(self.name.as_bytes());
        buf[12..14].copy_from_slice(&self.table_count.to_le_bytes());
        buf[14..18].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> TierResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(TierError::ParseError {
                reason: "database header truncated".to_string(),
            });
        }

        let mut name = [0u8; NAME_SIZE];
        name.copy_from_slice(&buf[4..12]);
        Ok(Self {
            magic: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            name: ShortName::from_bytes(name),
            table_count: u16::from_le_bytes([buf[12], buf[13]]),
            checksum: u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]),
        })
    }
}

/// Root container: ordered list of table names.
pub struct Database {
    pub header: DatabaseHeader,
    pub table_names: [ShortName; TABLES_PER_DATABASE],
    pub lock: ContainerLock,
}

impl Database {
    /// Constructs an empty in-memory database.
    pub fn create(name: ShortName) -> Self {
        Self {
            header: DatabaseHeader {
                magic: DATABASE_MAGIC,
                name,
                table_count: 0,
                checksum: 0,
            },
            table_names: [ShortName::default(); TABLES_PER_DATABASE],
            lock: ContainerLock::default(),
        }
    }

    /// Store-relative path of a database file.
    pub fn file_path(name: &ShortName) -> String {
        container_path(DATABASE_BASE, name, DATABASE_EXT)
    }

    pub fn name(&self) -> ShortName {
        self.header.name
    }

    /// Linked-table names, occupied prefix only.
    pub fn tables(&self) -> &[ShortName] {
        &self.table_names[..self.header.table_count as usize]
    }

    /// Resolves a raw table name against the linked list.
    pub fn resolve_table(&self, raw: &str) -> Option<ShortName> {
        self.tables().iter().copied().find(|name| name.matches(raw))
    }

    /// Appends a table name to the linked list.
    ///
    /// ## Error Conditions
    /// - `CapacityExceeded`: Table-count bound reached
    /// - `DuplicateName`: Name already linked
    pub fn link_table(&mut self, name: ShortName) -> TierResult<()> {
        let count = self.header.table_count as usize;
        if count >= TABLES_PER_DATABASE {
            return Err(TierError::CapacityExceeded {
                kind: "Database",
                name: self.header.name.to_string(),
                capacity: TABLES_PER_DATABASE,
            });
        }
        if self.table_names[..count].contains(&name) {
            return Err(TierError::DuplicateName {
                kind: "Table",
                name: name.to_string(),
            });
        }

        self.table_names[count] = name;
        self.header.table_count += 1;
        Ok(())
    }

    /// Removes a table name, compacting the list.
    pub fn unlink_table(&mut self, name: &ShortName) {
        let count = self.header.table_count as usize;
        if let Some(pos) = self.table_names[..count].iter().position(|n| n == name) {
            self.table_names.copy_within(pos + 1..count, pos);
            self.table_names[count - 1] = ShortName::default();
            self.header.table_count -= 1;
        }
    }

    /// Loads a linked table by raw name.
    pub fn get_table(&self, store: &DiskStore, raw: &str) -> TierResult<Arc<Mutex<Table>>> {
        let name = self.resolve_table(raw).ok_or_else(|| TierError::NotFound {
            kind: "Table",
            name: raw.to_string(),
        })?;
        Table::load(store, &name)
    }

    /// Appends a row to a linked table.
    pub fn append_row(&self, store: &DiskStore, table: &str, data: &[u8]) -> TierResult<u64> {
        let table = self.get_table(store, table)?;
        let mut guard = table.lock().unwrap_or_else(|e| e.into_inner());
        guard.append_row(store, data)
    }

    /// Copies out a row by table-global index, tombstoned or not.
    pub fn get_row(&self, store: &DiskStore, table: &str, index: u64) -> TierResult<Vec<u8>> {
        let table = self.get_table(store, table)?;
        let guard = table.lock().unwrap_or_else(|e| e.into_inner());
        guard.get_row(store, index)
    }

    /// Overwrites a row by table-global index.
    pub fn insert_row(
        &self,
        store: &DiskStore,
        table: &str,
        index: u64,
        data: &[u8],
    ) -> TierResult<()> {
        let table = self.get_table(store, table)?;
        let guard = table.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert_row(store, index, data)
    }

    /// Tombstones a row by table-global index.
    pub fn delete_row(&self, store: &DiskStore, table: &str, index: u64) -> TierResult<()> {
        let table = self.get_table(store, table)?;
        let guard = table.lock().unwrap_or_else(|e| e.into_inner());
        guard.delete_row(store, index)
    }

    /// Deletes a linked table recursively and unlinks its name.
    pub fn delete_table(&mut self, store: &DiskStore, raw: &str, full: bool) -> TierResult<()> {
        let name = self.resolve_table(raw).ok_or_else(|| TierError::NotFound {
            kind: "Table",
            name: raw.to_string(),
        })?;

        let table = Table::load(store, &name)?;
        {
            let guard = table.lock().unwrap_or_else(|e| e.into_inner());
            guard.delete(store, full)?;
        }

        self.unlink_table(&name);
        info!("Table [{}] was deleted successfully", name);
        Ok(())
    }

    /// Combined checksum over the header (checksum zeroed) and the full
    /// table-name capacity. Pure.
    pub fn get_checksum(&self) -> u32 {
        let mut header = self.header;
        header.checksum = 0;
        let header_bytes = header.to_bytes();
        let names = flatten_names(&self.table_names);
        combined_checksum(&[header_bytes.as_slice(), names.as_slice()])
    }

    /// Persists the database, skipping all I/O when the checksum is
    /// unchanged.
    pub fn save(&mut self, store: &DiskStore) -> TierResult<()> {
        let checksum = self.get_checksum();
        if checksum == self.header.checksum {
            return Ok(());
        }

        let path = Self::file_path(&self.header.name);
        let mut content = store.open(&path, OpenMode::Create)?;

        self.header.checksum = checksum;
        let mut offset = 0u64;
        content.write_at(offset, &pack(&self.header.to_bytes()))?;
        offset += packed_len(DatabaseHeader::SIZE) as u64;

        for ordinal in 0..self.header.table_count as usize {
            content.write_at(offset, &pack(self.table_names[ordinal].as_bytes()))?;
            offset += packed_len(NAME_SIZE) as u64;
        }
        Ok(())
    }

    /// Loads a database through the global cache.
    ///
    /// ## Error Conditions
    /// - `InvalidMagic`: File does not open with the database magic; the
    ///   partially constructed entity is dropped
    pub fn load(store: &DiskStore, name: &ShortName) -> TierResult<Arc<Mutex<Database>>> {
        let classes = cache::global();
        if let Some(database) = classes.databases.find(name, DATABASE_BASE) {
            debug!("Loading database [{}] from cache", name);
            return Ok(database);
        }

        let _section = classes.databases.load_section();
        if let Some(database) = classes.databases.find(name, DATABASE_BASE) {
            return Ok(database);
        }

        let path = Self::file_path(name);
        debug!("Loading database [{}] from disk", path);
        let mut content = store.open(&path, OpenMode::Read)?;

        let mut raw_header = vec![0u8; packed_len(DatabaseHeader::SIZE)];
        let n = content.read_at(0, &mut raw_header)?;
        let header = DatabaseHeader::from_bytes(&unpack(&raw_header[..n], DatabaseHeader::SIZE)?)?;

        if header.magic != DATABASE_MAGIC {
            return Err(TierError::InvalidMagic {
                kind: "Database",
                path,
                expected: DATABASE_MAGIC,
                found: header.magic,
            });
        }
        if header.table_count as usize > TABLES_PER_DATABASE {
            return Err(TierError::ParseError {
                reason: format!(
                    "database [{}] table count {} out of range",
                    name, header.table_count
                ),
            });
        }

        let mut table_names = [ShortName::default(); TABLES_PER_DATABASE];
        let mut offset = packed_len(DatabaseHeader::SIZE) as u64;
        for slot in table_names.iter_mut().take(header.table_count as usize) {
            let mut raw = vec![0u8; packed_len(NAME_SIZE)];
            let n = content.read_at(offset, &mut raw)?;
            let bytes = unpack(&raw[..n], NAME_SIZE)?;
            let mut fixed = [0u8; NAME_SIZE];
            fixed.copy_from_slice(&bytes);
            *slot = ShortName::from_bytes(fixed);
            offset += packed_len(NAME_SIZE) as u64;
        }

        let database = Database {
            header,
            table_names,
            lock: ContainerLock::default(),
        };

        let computed = database.get_checksum();
        if computed != header.checksum {
            return Err(TierError::ChecksumMismatch {
                kind: "Database",
                name: name.to_string(),
                stored: header.checksum,
                computed,
            });
        }

        Ok(classes.databases.add(store, DATABASE_BASE, database))
    }

    /// Deletes the database; with `full`, linked tables are deleted
    /// recursively in parallel first.
    pub fn delete(&self, store: &DiskStore, full: bool) -> TierResult<()> {
        let worker = current_worker();
        if !self.lock.require_write(worker) {
            return Err(TierError::LockUnavailable {
                kind: "Database",
                name: self.header.name.to_string(),
                worker,
            });
        }

        if full {
            self.tables()
                .par_iter()
                .for_each(|table_name| match Table::load(store, table_name) {
                    Ok(table) => {
                        let guard = table.lock().unwrap_or_else(|e| e.into_inner());
                        if let Err(e) = guard.delete(store, full) {
                            debug!("Table [{}] delete failed: {}", table_name, e);
                        }
                    }
                    Err(e) => debug!("Table [{}] already gone: {}", table_name, e),
                });
        }

        if let Err(e) = store.delete(&Self::file_path(&self.header.name)) {
            debug!("Database [{}] file already gone: {}", self.header.name, e);
        }
        cache::global()
            .databases
            .drop_entry(&self.header.name, DATABASE_BASE);
        self.lock.release_write(worker);
        Ok(())
    }
}

impl Cached for Database {
    const KIND: &'static str = "Database";

    fn cache_name(&self) -> ShortName {
        self.header.name
    }

    fn write_back(&mut self, store: &DiskStore) -> TierResult<()> {
        self.save(store)
    }
}
