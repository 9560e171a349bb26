// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end engine scenarios against the library API.

use serial_test::serial;
use tempfile::TempDir;
use tierbase::container::{PAGES_PER_DIRECTORY, PAGE_CONTENT_SIZE};
use tierbase::core::EngineConfig;
use tierbase::kernel::{Kernel, KernelAnswer};

fn kernel() -> (TempDir, Kernel) {
    let temp = TempDir::new().unwrap();
    tierbase::cache::global().discard_all();

    let config = EngineConfig {
        data_dir: temp.path().join("data"),
        ..EngineConfig::default()
    };
    (temp, Kernel::new(config).unwrap())
}

fn run(kernel: &mut Kernel, args: &[&str]) -> KernelAnswer {
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

fn setup_library(kernel: &mut Kernel) {
    assert_eq!(run(kernel, &["create", "database", "lib"]).code, 1);
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
fn scenario_append_and_fetch_by_index() {
    let (_temp, mut kernel) = kernel();
    setup_library(&mut kernel);

    let data = book_row("The Sea", "0040");
    run(&mut kernel, &["lib", "append", "row", "books", "values", &data]);

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert_eq!(answer.exit_code(), 0);
    assert_eq!(answer.size, 36);
    assert_eq!(answer.body.as_deref(), Some(data.as_bytes()));
}

#[test]
#[serial]
fn scenario_expression_delete_tombstones_row() {
    let (_temp, mut kernel) = kernel();
    setup_library(&mut kernel);

    run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &book_row("The Sea", "0040")],
    );

    let answer = run(
        &mut kernel,
        &[
            "lib", "delete", "row", "books", "by_exp", "column", "pages", ">", "10",
        ],
    );
    assert!(answer.is_ok());

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert!(answer.code < 0);
    assert!(answer.body.is_none());
}

#[test]
#[serial]
fn scenario_expression_get_with_limit_returns_one_row() {
    let (_temp, mut kernel) = kernel();
    setup_library(&mut kernel);

    run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &book_row("The Sea", "0040")],
    );
    run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &book_row("The Sea", "0099")],
    );

    let answer = run(
        &mut kernel,
        &[
            "lib", "get", "row", "books", "by_exp", "column", "title", "eq", "The Sea", "limit",
            "1",
        ],
    );
    assert_eq!(answer.code, 1);
    assert_eq!(answer.size, 36);
}

#[test]
#[serial]
fn scenario_corrupted_magic_rejects_database() {
    let (temp, mut kernel) = kernel();
    setup_library(&mut kernel);
    drop(kernel);

    let path = temp.path().join("data").join("db").join("LIB.tdb");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();

    tierbase::cache::global().discard_all();
    let config = EngineConfig {
        data_dir: temp.path().join("data"),
        ..EngineConfig::default()
    };
    let mut kernel = Kernel::new(config).unwrap();

    // The database no longer loads, so commands addressed to it fail.
    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert!(answer.code < 0);
    assert!(kernel.connection().is_none());
}

#[test]
#[serial]
fn scenario_flush_modify_rollback_restores_snapshot() {
    let (_temp, mut kernel) = kernel();
    setup_library(&mut kernel);

    let flushed = book_row("The Sea", "0040");
    run(&mut kernel, &["lib", "append", "row", "books", "values", &flushed]);
    assert_eq!(run(&mut kernel, &["lib", "flush"]).code, 1);

    run(
        &mut kernel,
        &[
            "lib",
            "update",
            "row",
            "books",
            &book_row("Overwrite", "9999"),
            "by_index",
            "0",
        ],
    );
    run(
        &mut kernel,
        &["lib", "append", "row", "books", "values", &book_row("Extra", "0001")],
    );

    assert_eq!(run(&mut kernel, &["lib", "rollback"]).code, 1);

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "0"]);
    assert_eq!(answer.body.as_deref(), Some(flushed.as_bytes()));

    let answer = run(&mut kernel, &["lib", "get", "row", "books", "by_index", "1"]);
    assert!(answer.code < 0);
}

#[test]
#[serial]
fn scenario_directory_overflow_allocates_second_directory() {
    let (_temp, mut kernel) = kernel();
    setup_library(&mut kernel);

    let rows_per_directory = (PAGE_CONTENT_SIZE / 36) * PAGES_PER_DIRECTORY;
    for i in 0..=rows_per_directory {
        let answer = run(
            &mut kernel,
            &[
                "lib",
                "append",
                "row",
                "books",
                "values",
                &book_row("Bulk", &format!("{:04}", i % 10000)),
            ],
        );
        assert!(answer.is_ok(), "append {} failed: {:?}", i, answer);
    }

    let connection = kernel.connection().unwrap();
    let guard = connection.lock().unwrap();
    let table = guard.get_table(kernel.store(), "books").unwrap();
    let tguard = table.lock().unwrap();
    assert_eq!(tguard.header.dir_count, 2);
}
