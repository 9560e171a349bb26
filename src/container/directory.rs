// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Directory: ordered list of page names.
//!
//! A directory routes row operations by a directory-local row index:
//! `page_ordinal = index / rows_per_page`, `slot = index % rows_per_page`.
//! The target page is re-hydrated through the global cache and the
//! operation delegates to the page's slot discipline. Appending past the
//! last page allocates a fresh uniquely-named page until the directory is
//! at [`PAGES_PER_DIRECTORY`], at which point the caller tries the next
//! directory.

use crate::cache::{self, Cached};
use crate::codec::{combined_checksum, pack, packed_len, unpack};
use crate::concurrent::lock::{current_worker, ContainerLock};
use crate::container::page::Page;
use crate::container::{
    entity_exists, flatten_names, DIRECTORY_BASE, DIRECTORY_EXT, DIRECTORY_MAGIC,
    PAGES_PER_DIRECTORY, PAGE_CONTENT_SIZE, PAGE_EXT,
};
use crate::core::name::{ShortName, NAME_SIZE};
use crate::core::paths::{container_path, unique_name};
use crate::error::{TierError, TierResult};
use crate::vfs::{DiskStore, OpenMode};
use log::debug;
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// Directory file header (version 1, little-endian).
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic ("TBDR")
/// 4       8     name (NUL-padded stem)
/// 12      2     page_count
/// 14      4     checksum
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DirectoryHeader {
    pub magic: u32,
    pub name: ShortName,
    pub page_count: u16,
    pub checksum: u32,
}

impl DirectoryHeader {
    /// Serialised header size in bytes, before codec widening.
    pub const SIZE: usize = 18;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..12].copy_from_slice(self.name.as_bytes());
        buf[12..14].copy_from_slice(&self.page_count.to_le_bytes());
        buf[14..18].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> TierResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(TierError::ParseError {
                reason: "directory header truncated".to_string(),
            });
        }

        let mut name = [0u8; NAME_SIZE];
        name.copy_from_slice(&buf[4..12]);
        Ok(Self {
            magic: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            name: ShortName::from_bytes(name),
            page_count: u16::from_le_bytes([buf[12], buf[13]]),
            checksum: u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]),
        })
    }
}

/// Ordered list of page names with row routing.
pub struct Directory {
    pub header: DirectoryHeader,
    pub page_names: [ShortName; PAGES_PER_DIRECTORY],
    pub lock: ContainerLock,
}

impl Directory {
    /// Constructs an empty in-memory directory.
    pub fn create(name: ShortName) -> Self {
        Self {
            header: DirectoryHeader {
                magic: DIRECTORY_MAGIC,
                name,
                page_count: 0,
                checksum: 0,
            },
            page_names: [ShortName::default(); PAGES_PER_DIRECTORY],
            lock: ContainerLock::default(),
        }
    }

    /// Constructs an empty directory under a generated unique name.
    pub fn create_empty(store: &DiskStore) -> TierResult<Self> {
        let name = unique_name(DIRECTORY_BASE, |candidate| {
            entity_exists(store, DIRECTORY_BASE, candidate, DIRECTORY_EXT)
        })?;
        Ok(Self::create(name))
    }

    /// Store-relative path of a directory file.
    pub fn file_path(name: &ShortName) -> String {
        container_path(DIRECTORY_BASE, name, DIRECTORY_EXT)
    }

    pub fn name(&self) -> ShortName {
        self.header.name
    }

    /// Row slots a single page holds for the given row width.
    pub fn rows_per_page(row_size: usize) -> usize {
        PAGE_CONTENT_SIZE / row_size
    }

    /// Registers a page name at the end of the list.
    pub fn link_page(&mut self, name: ShortName) -> TierResult<()> {
        let count = self.header.page_count as usize;
        if count >= PAGES_PER_DIRECTORY {
            return Err(TierError::CapacityExceeded {
                kind: "Directory",
                name: self.header.name.to_string(),
                capacity: PAGES_PER_DIRECTORY,
            });
        }
        if self.page_names[..count].contains(&name) {
            return Err(TierError::DuplicateName {
                kind: "Page",
                name: name.to_string(),
            });
        }

        self.page_names[count] = name;
        self.header.page_count += 1;
        Ok(())
    }

    /// Appends a row into the first page with a free slot, allocating a
    /// new page when every linked page is full.
    ///
    /// ## Output
    /// - `Ok(index)`: Directory-local row index
    /// - `Err(TierError::CapacityExceeded)`: Directory full; the caller
    ///   tries the next directory
    pub fn append_row(&mut self, store: &DiskStore, row: &[u8]) -> TierResult<u64> {
        let rows_per_page = Self::rows_per_page(row.len());

        for ordinal in 0..self.header.page_count as usize {
            let page = Page::load(store, &self.header.name, &self.page_names[ordinal])?;
            let mut guard = page.lock().unwrap_or_else(|e| e.into_inner());
            match guard.append(row) {
                Ok(slot) => return Ok((ordinal * rows_per_page + slot) as u64),
                Err(TierError::CapacityExceeded { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        if self.header.page_count as usize >= PAGES_PER_DIRECTORY {
            return Err(TierError::CapacityExceeded {
                kind: "Directory",
                name: self.header.name.to_string(),
                capacity: PAGES_PER_DIRECTORY,
            });
        }

        let ordinal = self.header.page_count as usize;
        let mut page = Page::create_unique(store, self.header.name)?;
        let slot = page.append(row)?;
        let page_name = page.name();

        cache::global().pages.add(store, self.header.name.as_str(), page);
        self.link_page(page_name)?;
        Ok((ordinal * rows_per_page + slot) as u64)
    }

    /// Copies out the row at a directory-local index, tombstoned or not.
    pub fn get_row(&self, store: &DiskStore, index: u64, row_size: usize) -> TierResult<Vec<u8>> {
        let rows_per_page = Self::rows_per_page(row_size) as u64;
        let ordinal = (index / rows_per_page) as usize;
        if ordinal >= self.header.page_count as usize {
            return Err(TierError::RowNotFound { index });
        }

        let page = Page::load(store, &self.header.name, &self.page_names[ordinal])?;
        let guard = page.lock().unwrap_or_else(|e| e.into_inner());
        guard.get((index % rows_per_page) as usize, row_size)
    }

    /// Overwrites the row at a directory-local index unconditionally.
    pub fn insert_row(&self, store: &DiskStore, index: u64, row: &[u8]) -> TierResult<()> {
        let rows_per_page = Self::rows_per_page(row.len()) as u64;
        let ordinal = (index / rows_per_page) as usize;
        if ordinal >= self.header.page_count as usize {
            return Err(TierError::RowNotFound { index });
        }

        let page = Page::load(store, &self.header.name, &self.page_names[ordinal])?;
        let mut guard = page.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert((index % rows_per_page) as usize, row)
    }

    /// Tombstones the row at a directory-local index.
    pub fn delete_row(&self, store: &DiskStore, index: u64, row_size: usize) -> TierResult<()> {
        let rows_per_page = Self::rows_per_page(row_size) as u64;
        let ordinal = (index / rows_per_page) as usize;
        if ordinal >= self.header.page_count as usize {
            return Err(TierError::RowNotFound { index });
        }

        let page = Page::load(store, &self.header.name, &self.page_names[ordinal])?;
        let mut guard = page.lock().unwrap_or_else(|e| e.into_inner());
        guard.delete((index % rows_per_page) as usize, row_size)
    }

    /// Combined checksum over the header (checksum zeroed) and the full
    /// page-name capacity. Pure.
    pub fn get_checksum(&self) -> u32 {
        let mut header = self.header;
        header.checksum = 0;
        let header_bytes = header.to_bytes();
        let names = flatten_names(&self.page_names);
        combined_checksum(&[header_bytes.as_slice(), names.as_slice()])
    }

    /// Persists the directory, skipping all I/O when the checksum is
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
        offset += packed_len(DirectoryHeader::SIZE) as u64;

        for ordinal in 0..self.header.page_count as usize {
            content.write_at(offset, &pack(self.page_names[ordinal].as_bytes()))?;
            offset += packed_len(NAME_SIZE) as u64;
        }
        Ok(())
    }

    /// Loads a directory through the global cache.
    pub fn load(store: &DiskStore, name: &ShortName) -> TierResult<Arc<Mutex<Directory>>> {
        let classes = cache::global();
        if let Some(directory) = classes.directories.find(name, DIRECTORY_BASE) {
            debug!("Loading directory [{}] from cache", name);
            return Ok(directory);
        }

        let _section = classes.directories.load_section();
        if let Some(directory) = classes.directories.find(name, DIRECTORY_BASE) {
            return Ok(directory);
        }

        let path = Self::file_path(name);
        debug!("Loading directory [{}] from disk", path);
        let mut content = store.open(&path, OpenMode::Read)?;

        let mut raw_header = vec![0u8; packed_len(DirectoryHeader::SIZE)];
        let n = content.read_at(0, &mut raw_header)?;
        let header = DirectoryHeader::from_bytes(&unpack(&raw_header[..n], DirectoryHeader::SIZE)?)?;

        if header.magic != DIRECTORY_MAGIC {
            return Err(TierError::InvalidMagic {
                kind: "Directory",
                path,
                expected: DIRECTORY_MAGIC,
                found: header.magic,
            });
        }
        if header.page_count as usize > PAGES_PER_DIRECTORY {
            return Err(TierError::ParseError {
                reason: format!(
                    "directory [{}] page count {} out of range",
                    name, header.page_count
                ),
            });
        }

        let mut page_names = [ShortName::default(); PAGES_PER_DIRECTORY];
        let mut offset = packed_len(DirectoryHeader::SIZE) as u64;
        for slot in page_names.iter_mut().take(header.page_count as usize) {
            let mut raw = vec![0u8; packed_len(NAME_SIZE)];
            let n = content.read_at(offset, &mut raw)?;
            let bytes = unpack(&raw[..n], NAME_SIZE)?;
            let mut fixed = [0u8; NAME_SIZE];
            fixed.copy_from_slice(&bytes);
            *slot = ShortName::from_bytes(fixed);
            offset += packed_len(NAME_SIZE) as u64;
        }

        let directory = Directory {
            header,
            page_names,
            lock: ContainerLock::default(),
        };

        let computed = directory.get_checksum();
        if computed != header.checksum {
            return Err(TierError::ChecksumMismatch {
                kind: "Directory",
                name: name.to_string(),
                stored: header.checksum,
                computed,
            });
        }

        Ok(classes.directories.add(store, DIRECTORY_BASE, directory))
    }

    /// Deletes the directory; with `full`, child pages are flushed and
    /// unlinked in parallel first.
    ///
    /// ## Error Conditions
    /// - `LockUnavailable`: Another worker holds the write lock
    pub fn delete(&self, store: &DiskStore, full: bool) -> TierResult<()> {
        let worker = current_worker();
        if !self.lock.require_write(worker) {
            return Err(TierError::LockUnavailable {
                kind: "Directory",
                name: self.header.name.to_string(),
                worker,
            });
        }

        let classes = cache::global();
        if full {
            let owner = self.header.name;
            self.page_names[..self.header.page_count as usize]
                .par_iter()
                .for_each(|page_name| {
                    classes.pages.drop_entry(page_name, owner.as_str());
                    let path = container_path(owner.as_str(), page_name, PAGE_EXT);
                    if let Err(e) = store.delete(&path) {
                        debug!("Page [{}] already gone: {}", page_name, e);
                    }
                });
        }

        if let Err(e) = store.delete(&Self::file_path(&self.header.name)) {
            debug!("Directory [{}] file already gone: {}", self.header.name, e);
        }
        classes
            .directories
            .drop_entry(&self.header.name, DIRECTORY_BASE);
        self.lock.release_write(worker);
        Ok(())
    }
}

impl Cached for Directory {
    const KIND: &'static str = "Directory";

    fn cache_name(&self) -> ShortName {
        self.header.name
    }

    fn write_back(&mut self, store: &DiskStore) -> TierResult<()> {
        self.save(store)
    }
}
