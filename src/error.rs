// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Error types for tierbase operations.
//!
//! Provides structured error handling with detailed context for debugging.

use std::fmt;

/// Standard Result type for all tierbase operations.
pub type TierResult<T> = Result<T, TierError>;

/// Error types for tierbase operations.
#[derive(Debug, Clone)]
pub enum TierError {
    /// Container file or entity not found.
    NotFound { kind: &'static str, name: String },

    /// Row index does not resolve to a stored slot.
    RowNotFound { index: u64 },

    /// Container file carries the wrong magic value.
    InvalidMagic {
        kind: &'static str,
        path: String,
        expected: u32,
        found: u32,
    },

    /// Stored checksum does not match the recomputed one.
    ChecksumMismatch {
        kind: &'static str,
        name: String,
        stored: u32,
        computed: u32,
    },

    /// I/O error during file operations.
    IoError { operation: String, reason: String },

    /// Write lock held by another worker.
    LockUnavailable {
        kind: &'static str,
        name: String,
        worker: usize,
    },

    /// Container child-list capacity reached.
    CapacityExceeded {
        kind: &'static str,
        name: String,
        capacity: usize,
    },

    /// Row or column definition violates the table schema.
    SchemaViolation { reason: String },

    /// Child name already present in the container.
    DuplicateName { kind: &'static str, name: String },

    /// Unknown keyword or truncated token stream.
    MalformedCommand { reason: String },

    /// Parse error (invalid format).
    ParseError { reason: String },

    /// Entity is not registered in the global cache.
    NotCached { name: String },

    /// Unique-name generation exhausted its candidate budget.
    NameExhausted { base: String },

    /// No snapshot exists for the database.
    SnapshotMissing { database: String },
}

impl TierError {
    /// Stable negative answer code reported through the kernel.
    ///
    /// ## Output
    /// - `i32`: Always strictly negative
    pub fn answer_code(&self) -> i32 {
        match self {
            TierError::NotFound { .. } => -1,
            TierError::NotCached { .. } => -2,
            TierError::InvalidMagic { .. } => -3,
            TierError::IoError { .. } => -4,
            TierError::LockUnavailable { .. } => -5,
            TierError::CapacityExceeded { .. } => -6,
            TierError::SchemaViolation { .. } => -7,
            TierError::DuplicateName { .. } => -8,
            TierError::MalformedCommand { .. } => -9,
            TierError::ParseError { .. } => -10,
            TierError::NameExhausted { .. } => -11,
            TierError::SnapshotMissing { .. } => -12,
            TierError::ChecksumMismatch { .. } => -13,
            TierError::RowNotFound { .. } => -14,
        }
    }
}

impl fmt::Display for TierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierError::NotFound { kind, name } => {
                write!(f, "{} [{}] not found", kind, name)
            }
            TierError::RowNotFound { index } => {
                write!(f, "Row [{}] not found", index)
            }
            TierError::InvalidMagic {
                kind,
                path,
                expected,
                found,
            } => write!(
                f,
                "{} file wrong magic for [{}]: expected {:#010x}, found {:#010x}",
                kind, path, expected, found
            ),
            TierError::ChecksumMismatch {
                kind,
                name,
                stored,
                computed,
            } => write!(
                f,
                "{} [{}] checksum mismatch: stored {:#010x}, computed {:#010x}",
                kind, name, stored, computed
            ),
            TierError::IoError { operation, reason } => {
                write!(f, "I/O error during {}: {}", operation, reason)
            }
            TierError::LockUnavailable { kind, name, worker } => {
                write!(f, "Can't lock {} [{}] for worker {}", kind, name, worker)
            }
            TierError::CapacityExceeded {
                kind,
                name,
                capacity,
            } => write!(f, "{} [{}] is full ({} children)", kind, name, capacity),
            TierError::SchemaViolation { reason } => {
                write!(f, "Schema violation: {}", reason)
            }
            TierError::DuplicateName { kind, name } => {
                write!(f, "{} [{}] already exists", kind, name)
            }
            TierError::MalformedCommand { reason } => {
                write!(f, "Malformed command: {}", reason)
            }
            TierError::ParseError { reason } => {
                write!(f, "Parse error: {}", reason)
            }
            TierError::NotCached { name } => {
                write!(f, "Entity [{}] is not registered in the cache", name)
            }
            TierError::NameExhausted { base } => {
                write!(f, "Name generation exhausted under [{}]", base)
            }
            TierError::SnapshotMissing { database } => {
                write!(f, "No snapshot found for database [{}]", database)
            }
        }
    }
}

impl std::error::Error for TierError {}

impl From<std::io::Error> for TierError {
    fn from(e: std::io::Error) -> Self {
        TierError::IoError {
            operation: "io".to_string(),
            reason: e.to_string(),
        }
    }
}
