// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration.
//!
//! Deserialised from `tierbase.toml` when present; every field carries a
//! working default so the engine runs without any configuration file.
//!
//! ```toml
//! data_dir = ".tierbase"
//! shadow_dir = "shadow"
//!
//! [cache]
//! databases = 4
//! tables = 16
//! directories = 32
//! pages = 64
//! ```

use crate::error::{TierError, TierResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "tierbase.toml";

/// Per-class capacity bounds for the global container cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheCapacities {
    pub databases: usize,
    pub tables: usize,
    pub directories: usize,
    pub pages: usize,
}

impl Default for CacheCapacities {
    fn default() -> Self {
        Self {
            databases: 4,
            tables: 16,
            directories: 32,
            pages: 64,
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory holding all container files.
    pub data_dir: PathBuf,

    /// Directory name (under `data_dir`) holding transaction snapshots.
    pub shadow_dir: String,

    /// Global cache capacities.
    pub cache: CacheCapacities,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".tierbase"),
            shadow_dir: "shadow".to_string(),
            cache: CacheCapacities::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// ## Input
    /// - `path`: Path to a `tierbase.toml`
    ///
    /// ## Output
    /// - `Ok(EngineConfig)`: Parsed configuration
    /// - `Err(TierError::IoError)`: File unreadable
    /// - `Err(TierError::ParseError)`: Invalid TOML
    pub fn load(path: &Path) -> TierResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| TierError::IoError {
            operation: "read_config".to_string(),
            reason: e.to_string(),
        })?;

        toml::from_str(&raw).map_err(|e| TierError::ParseError {
            reason: format!("invalid config [{}]: {}", path.display(), e),
        })
    }

    /// Loads `tierbase.toml` from `dir`, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(dir: &Path) -> TierResult<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}
