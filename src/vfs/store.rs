// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Disk-backed content store.
//!
//! Content is addressed by store-relative 8.3 paths (see
//! [`crate::core::paths`]). Handles are numbered for log correlation and
//! close on drop, on every path including error paths.

use crate::error::{TierError, TierResult};
use log::{debug, error};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Open disposition for [`DiskStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file content, read-only.
    Read,
    /// Create-if-missing file content, read-write.
    Create,
}

/// Disk-backed content store rooted at the engine data directory.
pub struct DiskStore {
    root: PathBuf,
    next_handle: AtomicU64,
}

/// Open content handle.
///
/// Wraps one file plus its handle number; dropping the handle closes the
/// content.
pub struct Content {
    id: u64,
    file: File,
}

impl DiskStore {
    /// Opens a store rooted at `root`, creating the directory when absent.
    pub fn new(root: &Path) -> TierResult<Self> {
        std::fs::create_dir_all(root).map_err(|e| TierError::IoError {
            operation: "create_store_root".to_string(),
            reason: format!("{}: {}", root.display(), e),
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a store-relative path to an absolute one.
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Opens content at `rel`.
    ///
    /// ## Input
    /// - `rel`: Store-relative 8.3 path
    /// - `mode`: [`OpenMode::Read`] or [`OpenMode::Create`]
    ///
    /// ## Output
    /// - `Ok(Content)`: Numbered handle
    /// - `Err(TierError::NotFound)`: Missing content in `Read` mode
    /// - `Err(TierError::IoError)`: Anything else
    pub fn open(&self, rel: &str, mode: OpenMode) -> TierResult<Content> {
        let path = self.resolve(rel);

        if mode == OpenMode::Create {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| TierError::IoError {
                    operation: "create_base_dir".to_string(),
                    reason: format!("{}: {}", parent.display(), e),
                })?;
            }
        }

        let result = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(&path),
            OpenMode::Create => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path),
        };

        let file = result.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TierError::NotFound {
                kind: "Content",
                name: rel.to_string(),
            },
            _ => TierError::IoError {
                operation: "open_content".to_string(),
                reason: format!("{}: {}", path.display(), e),
            },
        })?;

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        debug!("Content [{}] opened [{}]", id, rel);
        Ok(Content { id, file })
    }

    /// Checks whether content exists at `rel`.
    pub fn exists(&self, rel: &str) -> bool {
        self.resolve(rel).is_file()
    }

    /// Deletes content at `rel`.
    pub fn delete(&self, rel: &str) -> TierResult<()> {
        let path = self.resolve(rel);
        std::fs::remove_file(&path).map_err(|e| {
            error!("Can't delete content [{}]: {}", rel, e);
            TierError::IoError {
                operation: "delete_content".to_string(),
                reason: format!("{}: {}", path.display(), e),
            }
        })
    }

    /// Copies content between store-relative paths, creating target
    /// directories as needed. Used by the snapshot layer.
    pub fn copy(&self, from: &str, to: &str) -> TierResult<u64> {
        let src = self.resolve(from);
        let dst = self.resolve(to);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TierError::IoError {
                operation: "create_copy_dir".to_string(),
                reason: format!("{}: {}", parent.display(), e),
            })?;
        }

        std::fs::copy(&src, &dst).map_err(|e| TierError::IoError {
            operation: "copy_content".to_string(),
            reason: format!("{} -> {}: {}", src.display(), dst.display(), e),
        })
    }
}

impl Content {
    /// Handle number, for log correlation only.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// ## Output
    /// - `Ok(n)`: Bytes transferred; shorter than `buf.len()` only at
    ///   end of content
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> TierResult<usize> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| TierError::IoError {
                operation: "seek_content".to_string(),
                reason: e.to_string(),
            })?;

        let mut total = 0;
        while total < buf.len() {
            let n = self.file.read(&mut buf[total..]).map_err(|e| TierError::IoError {
                operation: "read_content".to_string(),
                reason: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    /// Writes `buf` starting at `offset`.
    ///
    /// ## Output
    /// - `Ok(n)`: Bytes transferred; always `buf.len()` on success
    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> TierResult<usize> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| TierError::IoError {
                operation: "seek_content".to_string(),
                reason: e.to_string(),
            })?;

        self.file.write_all(buf).map_err(|e| TierError::IoError {
            operation: "write_content".to_string(),
            reason: e.to_string(),
        })?;
        Ok(buf.len())
    }
}

impl Drop for Content {
    fn drop(&mut self) {
        debug!("Content [{}] closed", self.id);
    }
}
