// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Page: leaf storage container.
//!
//! A page holds a fixed-capacity content buffer carved into row slots of
//! `row_size` bytes at offsets `k * row_size`. The first byte of a slot is
//! either a valid leading data byte or the [`PAGE_EMPTY`](super::PAGE_EMPTY)
//! sentinel marking the slot as tombstoned: readers skip it, append reuses
//! it. `content_len` is the high-water mark of allocated bytes; only that
//! prefix is persisted.

use crate::cache::{self, Cached};
use crate::codec::{combined_checksum, pack, packed_len, unpack};
use crate::concurrent::lock::ContainerLock;
use crate::container::{entity_exists, PAGE_CONTENT_SIZE, PAGE_EMPTY, PAGE_EXT, PAGE_MAGIC};
use crate::core::name::ShortName;
use crate::core::paths::{container_path, unique_name};
use crate::error::{TierError, TierResult};
use crate::vfs::{DiskStore, OpenMode};
use log::debug;
use std::sync::{Arc, Mutex};

/// Page file header (version 1, little-endian).
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic ("TBPG")
/// 4       8     name (NUL-padded stem)
/// 12      2     content_len
/// 14      4     checksum
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub magic: u32,
    pub name: ShortName,
    pub content_len: u16,
    pub checksum: u32,
}

impl PageHeader {
    /// Serialised header size in bytes, before codec widening.
    pub const SIZE: usize = 18;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..12].copy_from_slice(self.name.as_bytes());
        buf[12..14].copy_from_slice(&self.content_len.to_le_bytes());
        buf[14..18].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> TierResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(TierError::ParseError {
                reason: "page header truncated".to_string(),
            });
        }

        let mut name = [0u8; 8];
        name.copy_from_slice(&buf[4..12]);
        Ok(Self {
            magic: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            name: ShortName::from_bytes(name),
            content_len: u16::from_le_bytes([buf[12], buf[13]]),
            checksum: u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]),
        })
    }
}

/// Leaf storage container.
pub struct Page {
    pub header: PageHeader,
    /// Parent directory stem; doubles as the file base path.
    pub owner: ShortName,
    content: Box<[u8; PAGE_CONTENT_SIZE]>,
    pub lock: ContainerLock,
}

impl Page {
    /// Constructs an empty in-memory page.
    pub fn create(name: ShortName, owner: ShortName) -> Self {
        Self {
            header: PageHeader {
                magic: PAGE_MAGIC,
                name,
                content_len: 0,
                checksum: 0,
            },
            owner,
            content: Box::new([0u8; PAGE_CONTENT_SIZE]),
            lock: ContainerLock::default(),
        }
    }

    /// Constructs an empty page under a generated unique name.
    pub fn create_unique(store: &DiskStore, owner: ShortName) -> TierResult<Self> {
        let name = unique_name(owner.as_str(), |candidate| {
            entity_exists(store, owner.as_str(), candidate, PAGE_EXT)
        })?;
        Ok(Self::create(name, owner))
    }

    /// Store-relative path of a page file.
    pub fn file_path(owner: &ShortName, name: &ShortName) -> String {
        container_path(owner.as_str(), name, PAGE_EXT)
    }

    pub fn name(&self) -> ShortName {
        self.header.name
    }

    /// Number of allocated row slots for the given row width.
    pub fn occupied_slots(&self, row_size: usize) -> usize {
        self.header.content_len as usize / row_size
    }

    /// True when no further slot fits and no tombstone is free.
    pub fn is_full(&self, row_size: usize) -> bool {
        self.first_tombstone(row_size).is_none()
            && self.header.content_len as usize + row_size > PAGE_CONTENT_SIZE
    }

    fn first_tombstone(&self, row_size: usize) -> Option<usize> {
        (0..self.occupied_slots(row_size))
            .find(|&slot| self.content[slot * row_size] == PAGE_EMPTY)
    }

    /// Writes a row into the next free slot.
    ///
    /// The first tombstone is reused before a fresh offset is allocated.
    ///
    /// ## Output
    /// - `Ok(slot)`: Slot ordinal the row landed in
    /// - `Err(TierError::CapacityExceeded)`: Page is full
    pub fn append(&mut self, row: &[u8]) -> TierResult<usize> {
        let row_size = row.len();
        debug_assert!(row_size > 0);

        if let Some(slot) = self.first_tombstone(row_size) {
            self.content[slot * row_size..slot * row_size + row_size].copy_from_slice(row);
            return Ok(slot);
        }

        let offset = self.header.content_len as usize;
        if offset + row_size > PAGE_CONTENT_SIZE {
            return Err(TierError::CapacityExceeded {
                kind: "Page",
                name: self.header.name.to_string(),
                capacity: self.occupied_slots(row_size),
            });
        }

        self.content[offset..offset + row_size].copy_from_slice(row);
        self.header.content_len += row_size as u16;
        Ok(offset / row_size)
    }

    /// Writes a row at `slot` unconditionally, extending the high-water
    /// mark when the slot lies beyond it.
    pub fn insert(&mut self, slot: usize, row: &[u8]) -> TierResult<()> {
        let row_size = row.len();
        let offset = slot * row_size;
        let end = offset + row_size;
        if end > PAGE_CONTENT_SIZE {
            return Err(TierError::CapacityExceeded {
                kind: "Page",
                name: self.header.name.to_string(),
                capacity: PAGE_CONTENT_SIZE / row_size,
            });
        }

        self.content[offset..end].copy_from_slice(row);
        if end > self.header.content_len as usize {
            self.header.content_len = end as u16;
        }
        Ok(())
    }

    /// Tombstones the slot.
    pub fn delete(&mut self, slot: usize, row_size: usize) -> TierResult<()> {
        let offset = slot * row_size;
        if offset + row_size > self.header.content_len as usize {
            return Err(TierError::RowNotFound { index: slot as u64 });
        }

        self.content[offset] = PAGE_EMPTY;
        Ok(())
    }

    /// Copies a row slot out, tombstoned or not.
    pub fn get(&self, slot: usize, row_size: usize) -> TierResult<Vec<u8>> {
        let offset = slot * row_size;
        if offset + row_size > self.header.content_len as usize {
            return Err(TierError::RowNotFound { index: slot as u64 });
        }

        Ok(self.content[offset..offset + row_size].to_vec())
    }

    /// Combined checksum over the header (checksum zeroed) and the full
    /// content capacity. Pure; the stored checksum is left untouched.
    pub fn get_checksum(&self) -> u32 {
        let mut header = self.header;
        header.checksum = 0;
        let header_bytes = header.to_bytes();
        combined_checksum(&[header_bytes.as_slice(), self.content.as_slice()])
    }

    /// Persists the page, skipping all I/O when the checksum is unchanged.
    pub fn save(&mut self, store: &DiskStore) -> TierResult<()> {
        let checksum = self.get_checksum();
        if checksum == self.header.checksum {
            return Ok(());
        }

        let path = Self::file_path(&self.owner, &self.header.name);
        let mut content = store.open(&path, OpenMode::Create)?;

        self.header.checksum = checksum;
        let packed_header = pack(&self.header.to_bytes());
        content.write_at(0, &packed_header)?;

        let used = self.header.content_len as usize;
        content.write_at(
            packed_len(PageHeader::SIZE) as u64,
            &pack(&self.content[..used]),
        )?;
        Ok(())
    }

    /// Loads a page through the global cache.
    ///
    /// ## Output
    /// - Shared handle; repeated loads of the same (owner, name) return
    ///   the same entity without touching the file system
    pub fn load(
        store: &DiskStore,
        owner: &ShortName,
        name: &ShortName,
    ) -> TierResult<Arc<Mutex<Page>>> {
        let classes = cache::global();
        if let Some(page) = classes.pages.find(name, owner.as_str()) {
            debug!("Loading page [{}] from cache", name);
            return Ok(page);
        }

        let _section = classes.pages.load_section();
        if let Some(page) = classes.pages.find(name, owner.as_str()) {
            return Ok(page);
        }

        let path = Self::file_path(owner, name);
        debug!("Loading page [{}] from disk", path);
        let mut content = store.open(&path, OpenMode::Read)?;

        let mut raw_header = vec![0u8; packed_len(PageHeader::SIZE)];
        let n = content.read_at(0, &mut raw_header)?;
        let header = PageHeader::from_bytes(&unpack(&raw_header[..n], PageHeader::SIZE)?)?;

        if header.magic != PAGE_MAGIC {
            return Err(TierError::InvalidMagic {
                kind: "Page",
                path,
                expected: PAGE_MAGIC,
                found: header.magic,
            });
        }

        let used = header.content_len as usize;
        if used > PAGE_CONTENT_SIZE {
            return Err(TierError::ParseError {
                reason: format!("page [{}] content length {} out of range", name, used),
            });
        }

        let mut buffer = Box::new([0u8; PAGE_CONTENT_SIZE]);
        if used > 0 {
            let mut raw = vec![0u8; packed_len(used)];
            let n = content.read_at(packed_len(PageHeader::SIZE) as u64, &mut raw)?;
            let bytes = unpack(&raw[..n], used)?;
            buffer[..used].copy_from_slice(&bytes);
        }

        let page = Page {
            header,
            owner: *owner,
            content: buffer,
            lock: ContainerLock::default(),
        };

        let computed = page.get_checksum();
        if computed != header.checksum {
            return Err(TierError::ChecksumMismatch {
                kind: "Page",
                name: name.to_string(),
                stored: header.checksum,
                computed,
            });
        }

        Ok(classes.pages.add(store, owner.as_str(), page))
    }
}

impl Cached for Page {
    const KIND: &'static str = "Page";

    fn cache_name(&self) -> ShortName {
        self.header.name
    }

    fn write_back(&mut self, store: &DiskStore) -> TierResult<()> {
        self.save(store)
    }
}
