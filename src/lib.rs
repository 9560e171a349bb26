// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! tierbase - hierarchical page-oriented storage engine with a
//! token-driven query kernel.
//!
//! User data lives in a four-tier containment hierarchy - Database →
//! Table → Directory → Page → Row - each tier persisted as a discrete,
//! self-describing, checksummed file. On top of storage, the kernel
//! parses a flat positional token language, compiles row predicates, and
//! dispatches mutations.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tierbase::core::EngineConfig;
//! use tierbase::kernel::Kernel;
//!
//! let mut kernel = Kernel::new(EngineConfig::default())?;
//!
//! let argv: Vec<String> = ["tierbase", "create", "database", "lib"]
//!     .map(String::from)
//!     .to_vec();
//! let answer = kernel.process_command(&argv);
//! assert!(answer.is_ok());
//! # Ok::<(), tierbase::TierError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Query Kernel (kernel)                   │
//! │   token dispatch · expression compile · row scan        │
//! ├─────────────────────────────────────────────────────────┤
//! │              Containers (container)                     │
//! │   Database ─▶ Table ─▶ Directory ─▶ Page                │
//! ├──────────────────────────┬──────────────────────────────┤
//! │   Global cache (cache)   │   Snapshots (snapshot)       │
//! │   dedup · write-back     │   flush · rollback           │
//! ├──────────────────────────┴──────────────────────────────┤
//! │   Codec (codec)          │   Locks (concurrent)         │
//! │   widening · checksums   │   per-container · process    │
//! ├─────────────────────────────────────────────────────────┤
//! │              File-system façade (vfs)                   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - `core`: names, paths, configuration
//! - `vfs`: content store over the underlying file system
//! - `codec`: byte-widening codec and container checksums
//! - `cache`: global container cache with write-back eviction
//! - `concurrent`: per-container locks and the process guard
//! - `container`: the four persisted container kinds
//! - `snapshot`: transaction flush and rollback
//! - `kernel`: token dispatcher, expressions, answers

pub mod cache;
pub mod codec;
pub mod concurrent;
pub mod container;
pub mod core;
pub mod error;
pub mod kernel;
pub mod snapshot;
pub mod vfs;


// Re-export commonly used types
pub use container::{Column, Database, Directory, Page, Table};
pub use core::{EngineConfig, ShortName};
pub use error::{TierError, TierResult};
pub use kernel::{Kernel, KernelAnswer};
pub use vfs::DiskStore;

/// tierbase version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
