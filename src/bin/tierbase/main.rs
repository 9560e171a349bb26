// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! tierbase command-line interface.

mod commands;
mod formatters;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "tierbase", version, about = "Hierarchical page-oriented storage engine")]
struct Cli {
    /// Directory holding tierbase.toml (defaults to the working directory)
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one command stream, e.g.
    /// `tierbase exec lib append row books values "..."`
    Exec {
        /// Database name followed by the token stream
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Interactive shell feeding lines through the kernel
    Shell,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code.min(255) as u8),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Exec { tokens, format } => commands::exec::execute(&cli.config_dir, &tokens, &format),
        Command::Shell => commands::shell::run(&cli.config_dir),
    }
}
