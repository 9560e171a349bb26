// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Interactive shell (REPL) implementation.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use tierbase::core::EngineConfig;
use tierbase::kernel::Kernel;

use crate::formatters;

pub fn run(config_dir: &Path) -> Result<i32> {
    let config = EngineConfig::load_or_default(config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;

    let data_dir = config.data_dir.clone();
    let mut kernel = Kernel::new(config).context("Failed to open the engine data directory")?;

    println!("tierbase shell v{}", tierbase::VERSION);
    println!("Data directory: {}", data_dir.display());
    println!("Type .exit to quit\n");

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("tierbase> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(trimmed);

                if trimmed == ".exit" || trimmed == ".quit" {
                    break;
                }

                let tokens = tokenize(trimmed);
                let argv: Vec<String> = std::iter::once("tierbase".to_string())
                    .chain(tokens)
                    .collect();

                let answer = kernel.process_command(&argv);
                println!("{}", formatters::format_text(&answer));
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    Ok(0)
}

/// Splits a shell line into tokens, honouring double quotes so row data
/// with spaces survives as one token.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
