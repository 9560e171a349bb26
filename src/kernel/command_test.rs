// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the command dispatcher.

use crate::cache;
use crate::core::config::EngineConfig;
use crate::kernel::command::{Kernel, KERNEL_VERSION};
use serial_test::serial;
use tempfile::TempDir;

fn kernel() -> (TempDir, Kernel) {
    let temp = TempDir::new().unwrap();
    cache::global().discard_all();

    let config = EngineConfig {
        data_dir: temp.path().join("data"),
        ..EngineConfig::default()
    };
    (temp, Kernel::new(config).unwrap())
}

fn run(kernel: &mut Kernel, args: &[&str]) -> crate::kernel::answer::KernelAnswer {
    let argv: Vec<String> = std::iter::once("tierbase".to_string())
        .chain(args.iter().map(|a| a.to_string()))
        .collect();
    kernel.process_command(&argv)
}

fn book_row(title: &str, pages: &str) -> String {
    let mut row = vec![b' '; 36];
    row[..title.len()].copy_from_slice(title.as_bytes());
    row[32..32 + pages.len()].copy_from_slice(pages.as_bytes());
    String::from_utf8(row).unwrap()
}

fn setup_books(kernel: &mut Kernel) {
    let answer = run(kernel, &["create", "database", "lib"]);
    assert_eq!(answer.code, 1);

    let answer = run(
        kernel,
        &[
            "lib", "create", "table", "books", "columns", "(", "title", "32", "str", "np", "na",
            "pages", "4", "int", "np", "na", ")",
        ],
    );
    assert_eq!(answer.code, 1);
}

#[test]
#[serial]
fn test_version_command() {
    let (_temp, mut kernel) = kernel();
    let answer = run(&mut kernel, &["version"]);
    assert_eq!(answer.body.as_deref(), Some(KERNEL_VERSION.as_bytes()));
    assert_eq!(answer.size, KERNEL_VERSION.len() as i32);
}

#[test]
#[serial]
fn test_create_append_get_by_index() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    let data = book_row("The Sea", "0040");
    let answer = run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &data],
    );
    assert_eq!(answer.code, 0);

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert_eq!(answer.code, 0);
    assert_eq!(answer.size, 36);
    assert_eq!(answer.body.as_deref(), Some(data.as_bytes()));
    assert_eq!(answer.exit_code(), 0);
}

#[test]
#[serial]
fn test_delete_by_expression_then_index_miss() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    let data = book_row("The Sea", "0040");
    run(&mut kernel, &["lib", "append", "row", "books", "values", &data]);

    let answer = run(
        &mut kernel,
        &[
            "lib", "delete", "row", "books", "by_exp", "column", "pages", ">", "10",
        ],
    );
    assert_eq!(answer.code, 1);

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert!(answer.code < 0);
    assert!(answer.body.is_none());
}

#[test]
#[serial]
fn test_get_by_expression_with_limit() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    let sea = book_row("The Sea", "0040");
    run(&mut kernel, &["lib", "append", "row", "books", "values", &sea]);
    let sea2 = book_row("The Sea", "0099");
    run(&mut kernel, &["lib", "append", "row", "books", "values", &sea2]);

    let answer = run(
        &mut kernel,
        &[
            "lib", "get", "row", "books", "by_exp", "column", "title", "eq", "The Sea", "limit",
            "1",
        ],
    );
    assert_eq!(answer.code, 1);
    assert_eq!(answer.size, 36);
    assert_eq!(answer.body.as_deref(), Some(sea.as_bytes()));
}

#[test]
#[serial]
fn test_update_by_index() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    let before = book_row("The Sea", "0040");
    run(&mut kernel, &["lib", "append", "row", "books", "values", &before]);

    let after = book_row("The Ocean", "0123");
    let answer = run(
        &mut kernel,
        &["lib", "update", "row", "books", &after, "by_index", "0"],
    );
    assert_eq!(answer.code, 1);

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert_eq!(answer.body.as_deref(), Some(after.as_bytes()));
}

#[test]
#[serial]
fn test_update_by_expression_writes_provided_data() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &book_row("A", "0001")],
    );
    run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &book_row("B", "0002")],
    );

    let replacement = book_row("C", "0003");
    let answer = run(
        &mut kernel,
        &[
            "lib",
            "update",
            "row",
            "books",
            &replacement,
            "by_exp",
            "column",
            "title",
            "eq",
            "B",
        ],
    );
    assert_eq!(answer.code, 1);

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "1"]);
    assert_eq!(answer.body.as_deref(), Some(replacement.as_bytes()));
}

#[test]
#[serial]
fn test_delete_table_and_database() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    let answer = run(&mut kernel, &["lib", "delete", "table", "books"]);
    assert_eq!(answer.code, 1);

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert!(answer.code < 0);

    let answer = run(&mut kernel, &["lib", "delete", "database"]);
    assert_eq!(answer.code, 1);
    assert!(kernel.connection().is_none());
}

#[test]
#[serial]
fn test_flush_and_rollback() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    let flushed = book_row("The Sea", "0040");
    run(&mut kernel, &["lib", "append", "row", "books", "values", &flushed]);

    let answer = run(&mut kernel, &["lib", "flush"]);
    assert_eq!(answer.code, 1);

    let replacement = book_row("Scribble", "0666");
    run(
        &mut kernel,
        &["lib", "update", "row", "books", &replacement, "by_index", "0"],
    );

    let answer = run(&mut kernel, &["lib", "rollback"]);
    assert_eq!(answer.code, 1);

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert_eq!(answer.body.as_deref(), Some(flushed.as_bytes()));
}

#[test]
#[serial]
fn test_migrate_with_projection() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    let answer = run(
        &mut kernel,
        &[
            "lib", "create", "table", "titles", "columns", "(", "title", "32", "str", "np", "na",
            ")",
        ],
    );
    assert_eq!(answer.code, 1);

    run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &book_row("A", "0001")],
    );
    run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &book_row("B", "0002")],
    );

    let answer = run(
        &mut kernel,
        &["lib", "migrate", "books", "titles", "nav", "(", "title", ")"],
    );
    assert_eq!(answer.code, 2);

    let answer = run(&mut kernel, &["lib", "get", "row", "titles", "by_index", "0"]);
    assert_eq!(answer.size, 32);
}

#[test]
#[serial]
fn test_duplicate_table_creation_fails() {
    let (_temp, mut kernel) = kernel();
    setup_books(&mut kernel);

    let answer = run(
        &mut kernel,
        &[
            "lib", "create", "table", "books", "columns", "(", "title", "32", "str", "np", "na",
            ")",
        ],
    );
    assert!(answer.code < 0);
}

#[test]
#[serial]
fn test_unknown_keyword() {
    let (_temp, mut kernel) = kernel();
    let answer = run(&mut kernel, &["frobnicate"]);
    assert!(answer.code < 0);
    assert!(answer.exit_code() != 0);
}

#[test]
#[serial]
fn test_connection_switches_between_databases() {
    let (_temp, mut kernel) = kernel();
    run(&mut kernel, &["create", "database", "one"]);
    run(&mut kernel, &["create", "database", "two"]);

    run(&mut kernel, &["one", "version"]);
    {
        let connection = kernel.connection().unwrap();
        assert_eq!(connection.lock().unwrap().name().as_str(), "ONE");
    }

    run(&mut kernel, &["two", "version"]);
    {
        let connection = kernel.connection().unwrap();
        assert_eq!(connection.lock().unwrap().name().as_str(), "TWO");
    }
}

#[test]
#[serial]
fn test_commands_without_connection_fail() {
    let (_temp, mut kernel) = kernel();
    let answer = run(
        &mut kernel,
        &["append", "row", "books", "values", "data"],
    );
    assert!(answer.code < 0);
}
