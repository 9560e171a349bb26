// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! CLI integration tests for the tierbase binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tierbase(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tierbase").unwrap();
    cmd.current_dir(temp.path());
    cmd
}

fn book_row(title: &str, pages: &str) -> String {
    let mut row = vec![b' '; 36];
    row[..title.len()].copy_from_slice(title.as_bytes());
    row[32..32 + pages.len()].copy_from_slice(pages.as_bytes());
    String::from_utf8(row).unwrap()
}

#[test]
fn test_exec_version() {
    let temp = TempDir::new().unwrap();
    tierbase(&temp)
        .args(["exec", "version"])
        .assert()
        .success()
        .stdout(predicate::str::contains("code=0"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_exec_round_trip_across_processes() {
    let temp = TempDir::new().unwrap();

    tierbase(&temp)
        .args(["exec", "create", "database", "lib"])
        .assert()
        .success();

    tierbase(&temp)
        .args([
            "exec", "lib", "create", "table", "books", "columns", "(", "title", "32", "str",
            "np", "na", "pages", "4", "int", "np", "na", ")",
        ])
        .assert()
        .success();

    let data = book_row("The Sea", "0040");
    tierbase(&temp)
        .args(["exec", "lib", "append", "row", "books", "values", &data])
        .assert()
        .success();

    // A fresh process must see the appended row from disk.
    tierbase(&temp)
        .args(["exec", "lib", "get", "row", "books", "by_index", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("size=36"))
        .stdout(predicate::str::contains("The Sea"));
}

#[test]
fn test_exec_json_format() {
    let temp = TempDir::new().unwrap();
    tierbase(&temp)
        .args(["exec", "--format", "json", "version"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"code\":0"));
}

#[test]
fn test_exec_error_exit_code() {
    let temp = TempDir::new().unwrap();
    tierbase(&temp)
        .args(["exec", "frobnicate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("code=-"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let temp = TempDir::new().unwrap();
    tierbase(&temp).args(["bogus"]).assert().failure();
}
