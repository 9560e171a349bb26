// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Table: schema plus an ordered list of directory names.
//!
//! A table owns the column descriptors (and the row width derived from
//! them) and routes row CRUD over its directories:
//! `dir_ordinal = index / rows_per_directory`. Appends walk the
//! directories in order until one accepts the row, allocating a fresh
//! directory when every linked one reports full. Migration copies live
//! rows into a destination table, optionally projecting named columns.

use crate::cache::{self, Cached};
use crate::codec::{combined_checksum, pack, packed_len, unpack};
use crate::concurrent::lock::{current_worker, ContainerLock};
use crate::container::column::{Column, ColumnInfo};
use crate::container::directory::Directory;
use crate::container::{
    flatten_names, DIRECTORIES_PER_TABLE, DIRECTORY_BASE, PAGES_PER_DIRECTORY, PAGE_CONTENT_SIZE,
    PAGE_EMPTY, TABLE_BASE, TABLE_EXT, TABLE_MAGIC,
};
use crate::core::name::{ShortName, NAME_SIZE};
use crate::core::paths::container_path;
use crate::error::{TierError, TierResult};
use crate::vfs::{DiskStore, OpenMode};
use log::debug;
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// Table file header (version 1, little-endian).
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic ("TBTB")
/// 4       8     name (NUL-padded stem)
/// 12      2     column_count
/// 14      2     dir_count
/// 16      4     checksum
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TableHeader {
    pub magic: u32,
    pub name: ShortName,
    pub column_count: u16,
    pub dir_count: u16,
    pub checksum: u32,
}

impl TableHeader {
    /// Serialised header size in bytes, before codec widening.
    pub const SIZE: usize = 20;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..12].copy_from_slice(self.name.as_bytes());
        buf[12..14].copy_from_slice(&self.column_count.to_le_bytes());
        buf[14..16].copy_from_slice(&self.dir_count.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> TierResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(TierError::ParseError {
                reason: "table header truncated".to_string(),
            });
        }

        let mut name = [0u8; NAME_SIZE];
        name.copy_from_slice(&buf[4..12]);
        Ok(Self {
            magic: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            name: ShortName::from_bytes(name),
            column_count: u16::from_le_bytes([buf[12], buf[13]]),
            dir_count: u16::from_le_bytes([buf[14], buf[15]]),
            checksum: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        })
    }
}

/// Schema and directory list with row-level CRUD.
pub struct Table {
    pub header: TableHeader,
    pub columns: Vec<Column>,
    pub dir_names: [ShortName; DIRECTORIES_PER_TABLE],
    row_size: usize,
    pub lock: ContainerLock,
}

impl Table {
    /// Constructs an in-memory table from compiled columns.
    ///
    /// ## Error Conditions
    /// - `SchemaViolation`: No columns, or the row width reaches the page
    ///   content capacity
    pub fn create(name: ShortName, columns: Vec<Column>) -> TierResult<Self> {
        if columns.is_empty() {
            return Err(TierError::SchemaViolation {
                reason: "table needs at least one column".to_string(),
            });
        }

        let row_size: usize = columns.iter().map(|c| c.size as usize).sum();
        if row_size >= PAGE_CONTENT_SIZE {
            return Err(TierError::SchemaViolation {
                reason: format!(
                    "row width {} reaches page content capacity {}",
                    row_size, PAGE_CONTENT_SIZE
                ),
            });
        }

        Ok(Self {
            header: TableHeader {
                magic: TABLE_MAGIC,
                name,
                column_count: columns.len() as u16,
                dir_count: 0,
                checksum: 0,
            },
            columns,
            dir_names: [ShortName::default(); DIRECTORIES_PER_TABLE],
            row_size,
            lock: ContainerLock::default(),
        })
    }

    /// Store-relative path of a table file.
    pub fn file_path(name: &ShortName) -> String {
        container_path(TABLE_BASE, name, TABLE_EXT)
    }

    pub fn name(&self) -> ShortName {
        self.header.name
    }

    /// Row width in bytes, the sum of all column sizes.
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Row slots a single directory holds for this schema.
    pub fn rows_per_directory(&self) -> u64 {
        (Directory::rows_per_page(self.row_size) * PAGES_PER_DIRECTORY) as u64
    }

    /// Resolves a column's offset and width within a row.
    pub fn column_info(&self, column_name: &str) -> TierResult<ColumnInfo> {
        let mut offset = 0usize;
        for column in &self.columns {
            if column.name == column_name {
                return Ok(ColumnInfo {
                    offset,
                    size: column.size as usize,
                });
            }
            offset += column.size as usize;
        }

        Err(TierError::NotFound {
            kind: "Column",
            name: column_name.to_string(),
        })
    }

    /// Registers a directory name at the end of the list.
    pub fn link_directory(&mut self, name: ShortName) -> TierResult<()> {
        let count = self.header.dir_count as usize;
        if count >= DIRECTORIES_PER_TABLE {
            return Err(TierError::CapacityExceeded {
                kind: "Table",
                name: self.header.name.to_string(),
                capacity: DIRECTORIES_PER_TABLE,
            });
        }
        if self.dir_names[..count].contains(&name) {
            return Err(TierError::DuplicateName {
                kind: "Directory",
                name: name.to_string(),
            });
        }

        self.dir_names[count] = name;
        self.header.dir_count += 1;
        Ok(())
    }

    /// Pads input data to the row width.
    ///
    /// Data wider than the row is rejected; shorter data is right-padded
    /// with ASCII spaces so the leading-space-trimming comparisons still
    /// see the intended field values.
    fn normalize_row(&self, data: &[u8]) -> TierResult<Vec<u8>> {
        if data.len() > self.row_size {
            return Err(TierError::SchemaViolation {
                reason: format!(
                    "input data is {} bytes, row width is {}",
                    data.len(),
                    self.row_size
                ),
            });
        }

        let mut row = vec![b' '; self.row_size];
        row[..data.len()].copy_from_slice(data);
        Ok(row)
    }

    /// Appends a row into the first directory with room, allocating a new
    /// directory when every linked one is full.
    ///
    /// ## Output
    /// - `Ok(index)`: Table-global row index
    /// - `Err(TierError::CapacityExceeded)`: Table at directory capacity
    /// - `Err(TierError::SchemaViolation)`: Data wider than the row
    pub fn append_row(&mut self, store: &DiskStore, data: &[u8]) -> TierResult<u64> {
        let row = self.normalize_row(data)?;
        let rows_per_directory = self.rows_per_directory();

        for ordinal in 0..self.header.dir_count as usize {
            let directory = Directory::load(store, &self.dir_names[ordinal])?;
            let mut guard = directory.lock().unwrap_or_else(|e| e.into_inner());
            match guard.append_row(store, &row) {
                Ok(local) => return Ok(ordinal as u64 * rows_per_directory + local),
                Err(TierError::CapacityExceeded { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        let ordinal = self.header.dir_count as usize;
        if ordinal >= DIRECTORIES_PER_TABLE {
            return Err(TierError::CapacityExceeded {
                kind: "Table",
                name: self.header.name.to_string(),
                capacity: DIRECTORIES_PER_TABLE,
            });
        }

        let mut directory = Directory::create_empty(store)?;
        let local = directory.append_row(store, &row)?;
        let dir_name = directory.name();
        debug!(
            "Table [{}] allocated directory [{}]",
            self.header.name, dir_name
        );

        cache::global()
            .directories
            .add(store, DIRECTORY_BASE, directory);
        self.link_directory(dir_name)?;
        Ok(ordinal as u64 * rows_per_directory + local)
    }

    /// Copies out the row at a table-global index, tombstoned or not.
    ///
    /// Callers that need live rows only check the first byte against
    /// [`PAGE_EMPTY`].
    pub fn get_row(&self, store: &DiskStore, index: u64) -> TierResult<Vec<u8>> {
        let rows_per_directory = self.rows_per_directory();
        let ordinal = (index / rows_per_directory) as usize;
        if ordinal >= self.header.dir_count as usize {
            return Err(TierError::RowNotFound { index });
        }

        let directory = Directory::load(store, &self.dir_names[ordinal])?;
        let guard = directory.lock().unwrap_or_else(|e| e.into_inner());
        guard.get_row(store, index % rows_per_directory, self.row_size)
    }

    /// Overwrites the row at a table-global index.
    pub fn insert_row(&self, store: &DiskStore, index: u64, data: &[u8]) -> TierResult<()> {
        let row = self.normalize_row(data)?;
        let rows_per_directory = self.rows_per_directory();
        let ordinal = (index / rows_per_directory) as usize;
        if ordinal >= self.header.dir_count as usize {
            return Err(TierError::RowNotFound { index });
        }

        let directory = Directory::load(store, &self.dir_names[ordinal])?;
        let guard = directory.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert_row(store, index % rows_per_directory, &row)
    }

    /// Tombstones the row at a table-global index.
    pub fn delete_row(&self, store: &DiskStore, index: u64) -> TierResult<()> {
        let rows_per_directory = self.rows_per_directory();
        let ordinal = (index / rows_per_directory) as usize;
        if ordinal >= self.header.dir_count as usize {
            return Err(TierError::RowNotFound { index });
        }

        let directory = Directory::load(store, &self.dir_names[ordinal])?;
        let guard = directory.lock().unwrap_or_else(|e| e.into_inner());
        guard.delete_row(store, index % rows_per_directory, self.row_size)
    }

    /// Copies every live row into `dst`, optionally projecting the named
    /// columns.
    ///
    /// ## Input
    /// - `dst`: Destination table; projected columns must match widths
    /// - `nav`: Column names to project; empty copies whole rows
    ///
    /// ## Output
    /// - `Ok(n)`: Rows copied
    pub fn migrate(&self, store: &DiskStore, dst: &mut Table, nav: &[String]) -> TierResult<u64> {
        let fields: Vec<(ColumnInfo, ColumnInfo)> = nav
            .iter()
            .map(|column| {
                let src_info = self.column_info(column)?;
                let dst_info = dst.column_info(column)?;
                if src_info.size != dst_info.size {
                    return Err(TierError::SchemaViolation {
                        reason: format!(
                            "column [{}] is {} bytes in source, {} in destination",
                            column, src_info.size, dst_info.size
                        ),
                    });
                }
                Ok((src_info, dst_info))
            })
            .collect::<TierResult<_>>()?;

        if nav.is_empty() && self.row_size != dst.row_size {
            return Err(TierError::SchemaViolation {
                reason: format!(
                    "row widths differ: {} vs {}",
                    self.row_size, dst.row_size
                ),
            });
        }

        let mut copied = 0u64;
        let mut index = 0u64;
        loop {
            let row = match self.get_row(store, index) {
                Ok(row) => row,
                Err(TierError::RowNotFound { .. }) => break,
                Err(e) => return Err(e),
            };
            index += 1;

            if row[0] == PAGE_EMPTY {
                continue;
            }

            if nav.is_empty() {
                dst.append_row(store, &row)?;
            } else {
                let mut projected = vec![b' '; dst.row_size];
                for (src_info, dst_info) in &fields {
                    projected[dst_info.offset..dst_info.offset + dst_info.size]
                        .copy_from_slice(&row[src_info.offset..src_info.offset + src_info.size]);
                }
                dst.append_row(store, &projected)?;
            }
            copied += 1;
        }

        Ok(copied)
    }

    /// Combined checksum over the header (checksum zeroed), the column
    /// records, and the full directory-name capacity. Pure.
    pub fn get_checksum(&self) -> u32 {
        let mut header = self.header;
        header.checksum = 0;
        let header_bytes = header.to_bytes();
        let column_bytes: Vec<[u8; Column::RECORD_SIZE]> =
            self.columns.iter().map(|c| c.to_bytes()).collect();
        let names = flatten_names(&self.dir_names);

        let mut sections: Vec<&[u8]> = vec![&header_bytes];
        for record in &column_bytes {
            sections.push(record);
        }
        sections.push(&names);
        combined_checksum(&sections)
    }

    /// Persists the table, skipping all I/O when the checksum is
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
        offset += packed_len(TableHeader::SIZE) as u64;

        for column in &self.columns {
            content.write_at(offset, &pack(&column.to_bytes()))?;
            offset += packed_len(Column::RECORD_SIZE) as u64;
        }

        for ordinal in 0..self.header.dir_count as usize {
            content.write_at(offset, &pack(self.dir_names[ordinal].as_bytes()))?;
            offset += packed_len(NAME_SIZE) as u64;
        }
        Ok(())
    }

    /// Loads a table through the global cache. The row width is re-derived
    /// from the loaded columns.
    pub fn load(store: &DiskStore, name: &ShortName) -> TierResult<Arc<Mutex<Table>>> {
        let classes = cache::global();
        if let Some(table) = classes.tables.find(name, TABLE_BASE) {
            debug!("Loading table [{}] from cache", name);
            return Ok(table);
        }

        let _section = classes.tables.load_section();
        if let Some(table) = classes.tables.find(name, TABLE_BASE) {
            return Ok(table);
        }

        let path = Self::file_path(name);
        debug!("Loading table [{}] from disk", path);
        let mut content = store.open(&path, OpenMode::Read)?;

        let mut raw_header = vec![0u8; packed_len(TableHeader::SIZE)];
        let n = content.read_at(0, &mut raw_header)?;
        let header = TableHeader::from_bytes(&unpack(&raw_header[..n], TableHeader::SIZE)?)?;

        if header.magic != TABLE_MAGIC {
            return Err(TierError::InvalidMagic {
                kind: "Table",
                path,
                expected: TABLE_MAGIC,
                found: header.magic,
            });
        }
        if header.dir_count as usize > DIRECTORIES_PER_TABLE {
            return Err(TierError::ParseError {
                reason: format!(
                    "table [{}] directory count {} out of range",
                    name, header.dir_count
                ),
            });
        }

        let mut offset = packed_len(TableHeader::SIZE) as u64;
        let mut columns = Vec::with_capacity(header.column_count as usize);
        for _ in 0..header.column_count {
            let mut raw = vec![0u8; packed_len(Column::RECORD_SIZE)];
            let n = content.read_at(offset, &mut raw)?;
            columns.push(Column::from_bytes(&unpack(&raw[..n], Column::RECORD_SIZE)?)?);
            offset += packed_len(Column::RECORD_SIZE) as u64;
        }

        let mut dir_names = [ShortName::default(); DIRECTORIES_PER_TABLE];
        for slot in dir_names.iter_mut().take(header.dir_count as usize) {
            let mut raw = vec![0u8; packed_len(NAME_SIZE)];
            let n = content.read_at(offset, &mut raw)?;
            let bytes = unpack(&raw[..n], NAME_SIZE)?;
            let mut fixed = [0u8; NAME_SIZE];
            fixed.copy_from_slice(&bytes);
            *slot = ShortName::from_bytes(fixed);
            offset += packed_len(NAME_SIZE) as u64;
        }

        let row_size = columns.iter().map(|c| c.size as usize).sum();
        let table = Table {
            header,
            columns,
            dir_names,
            row_size,
            lock: ContainerLock::default(),
        };

        let computed = table.get_checksum();
        if computed != header.checksum {
            return Err(TierError::ChecksumMismatch {
                kind: "Table",
                name: name.to_string(),
                stored: header.checksum,
                computed,
            });
        }

        Ok(classes.tables.add(store, TABLE_BASE, table))
    }

    /// Deletes the table; with `full`, child directories (and their
    /// pages) are deleted in parallel first.
    ///
    /// ## Error Conditions
    /// - `LockUnavailable`: Another worker holds the write lock
    pub fn delete(&self, store: &DiskStore, full: bool) -> TierResult<()> {
        let worker = current_worker();
        if !self.lock.require_write(worker) {
            return Err(TierError::LockUnavailable {
                kind: "Table",
                name: self.header.name.to_string(),
                worker,
            });
        }

        if full {
            self.dir_names[..self.header.dir_count as usize]
                .par_iter()
                .for_each(|dir_name| match Directory::load(store, dir_name) {
                    Ok(directory) => {
                        let guard = directory.lock().unwrap_or_else(|e| e.into_inner());
                        if let Err(e) = guard.delete(store, full) {
                            debug!("Directory [{}] delete failed: {}", dir_name, e);
                        }
                    }
                    Err(e) => debug!("Directory [{}] already gone: {}", dir_name, e),
                });
        }

        if let Err(e) = store.delete(&Self::file_path(&self.header.name)) {
            debug!("Table [{}] file already gone: {}", self.header.name, e);
        }
        cache::global()
            .tables
            .drop_entry(&self.header.name, TABLE_BASE);
        self.lock.release_write(worker);
        Ok(())
    }
}

impl Cached for Table {
    const KIND: &'static str = "Table";

    fn cache_name(&self) -> ShortName {
        self.header.name
    }

    fn write_back(&mut self, store: &DiskStore) -> TierResult<()> {
        self.save(store)
    }
}
