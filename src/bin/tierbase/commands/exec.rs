// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Exec command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use tierbase::core::EngineConfig;
use tierbase::kernel::Kernel;

use crate::formatters;

pub fn execute(config_dir: &Path, tokens: &[String], format: &str) -> Result<i32> {
    let config = EngineConfig::load_or_default(config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;

    let mut kernel = Kernel::new(config).context("Failed to open the engine data directory")?;

    let argv: Vec<String> = std::iter::once("tierbase".to_string())
        .chain(tokens.iter().cloned())
        .collect();
    let answer = kernel.process_command(&argv);

    let output = match format {
        "json" => formatters::format_json(&answer),
        _ => formatters::format_text(&answer),
    };
    println!("{}", output);

    Ok(answer.exit_code())
}
