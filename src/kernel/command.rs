// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Positional token dispatcher.
//!
//! `process_command` resolves the database name at `argv[1]` (load it,
//! switch to it, or keep the current connection), then consumes the
//! remaining tokens as a stream of commands. Errors abort the stream and
//! surface as a negative answer code.

use crate::cache;
use crate::concurrent::guard::{acquire_guard, ProcessGuard};
use crate::concurrent::lock::current_worker;
use crate::container::column::compile_columns;
use crate::container::database::Database;
use crate::container::table::Table;
use crate::container::{PAGE_EMPTY, TABLE_BASE};
use crate::core::config::EngineConfig;
use crate::core::name::ShortName;
use crate::error::{TierError, TierResult};
use crate::kernel::answer::KernelAnswer;
use crate::kernel::expression::{Expression, RowLogic};
use crate::snapshot;
use crate::vfs::DiskStore;
use log::{error, info};
use std::sync::{Arc, Mutex};

/// Kernel version string returned by the `version` command.
pub const KERNEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Query kernel context.
///
/// Owns the content store, the engine configuration and the active
/// database connection. The CLI keeps one kernel per process; the
/// library API allows any number side by side over distinct data
/// directories.
pub struct Kernel {
    config: EngineConfig,
    store: DiskStore,
    connection: Option<Arc<Mutex<Database>>>,
    _guard: ProcessGuard,
}

impl Kernel {
    /// Opens a kernel over the configured data directory.
    ///
    /// ## Error Conditions
    /// - `LockUnavailable`: Another process owns the data directory
    pub fn new(config: EngineConfig) -> TierResult<Self> {
        let guard = acquire_guard(&config.data_dir)?;
        let store = DiskStore::new(&config.data_dir)?;
        cache::global().configure(&config.cache);

        Ok(Self {
            config,
            store,
            connection: None,
            _guard: guard,
        })
    }

    /// Content store the kernel operates on.
    pub fn store(&self) -> &DiskStore {
        &self.store
    }

    /// Currently connected database, if any.
    pub fn connection(&self) -> Option<&Arc<Mutex<Database>>> {
        self.connection.as_ref()
    }

    /// Processes one command stream.
    ///
    /// ## Input
    /// - `args`: argv shape: `[program, database_name, token…]`
    ///
    /// ## Output
    /// - [`KernelAnswer`] with a negative code on the first failing
    ///   command
    pub fn process_command(&mut self, args: &[String]) -> KernelAnswer {
        let Some(db_token) = args.get(1) else {
            return KernelAnswer::from_error(&TierError::MalformedCommand {
                reason: "missing database name".to_string(),
            });
        };

        // Resolve the connection: keep it when the name matches, switch
        // when it does not, and when the token does not load as a
        // database treat it as the first command instead.
        let mut token_start = 2;
        let keeps_connection = match (&self.connection, ShortName::new(db_token)) {
            (Some(connection), Ok(name)) => {
                let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
                guard.name() == name
            }
            _ => false,
        };

        if !keeps_connection {
            self.connection = None;
            match ShortName::new(db_token).and_then(|name| Database::load(&self.store, &name)) {
                Ok(database) => self.connection = Some(database),
                Err(_) => token_start = 1,
            }
        }

        let tokens = &args[token_start.min(args.len())..];
        match self.run_commands(tokens) {
            Ok(answer) => answer,
            Err(e) => {
                error!("Command failed: {}", e);
                KernelAnswer::from_error(&e)
            }
        }
    }

    fn require_connection(&self) -> TierResult<Arc<Mutex<Database>>> {
        self.connection
            .clone()
            .ok_or_else(|| TierError::NotFound {
                kind: "Database",
                name: "<no connection>".to_string(),
            })
    }

    fn run_commands(&mut self, tokens: &[String]) -> TierResult<KernelAnswer> {
        let mut answer = KernelAnswer::default();
        let mut pos = 0;

        while pos < tokens.len() {
            let command = tokens[pos].as_str();
            pos += 1;

            match command {
                "version" => {
                    answer = KernelAnswer::with_body(0, KERNEL_VERSION.as_bytes().to_vec());
                }
                "flush" => {
                    let connection = self.require_connection()?;
                    snapshot::init_transaction(
                        &self.store,
                        &self.config.shadow_dir,
                        &connection,
                    )?;
                    answer = KernelAnswer::from_status(1);
                }
                "rollback" => {
                    snapshot::rollback(
                        &self.store,
                        &self.config.shadow_dir,
                        &mut self.connection,
                    )?;
                    answer = KernelAnswer::from_status(1);
                }
                "create" => {
                    answer = self.run_create(tokens, &mut pos)?;
                }
                "append" => {
                    expect_keyword(tokens, &mut pos, "row")?;
                    let table = next(tokens, &mut pos)?.to_string();
                    expect_keyword(tokens, &mut pos, "values")?;
                    let data = next(tokens, &mut pos)?.to_string();

                    let connection = self.require_connection()?;
                    let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
                    let index = guard.append_row(&self.store, &table, data.as_bytes())?;
                    info!(
                        "Row [{}] successfully added to table [{}] of database [{}]",
                        data,
                        table,
                        guard.name()
                    );
                    answer = KernelAnswer::from_status(index as i32);
                }
                "get" => {
                    expect_keyword(tokens, &mut pos, "row")?;
                    answer = self.run_get(tokens, &mut pos)?;
                }
                "update" => {
                    expect_keyword(tokens, &mut pos, "row")?;
                    answer = self.run_update(tokens, &mut pos)?;
                }
                "delete" => {
                    answer = self.run_delete(tokens, &mut pos)?;
                }
                "migrate" => {
                    answer = self.run_migrate(tokens, &mut pos)?;
                }
                unknown => {
                    return Err(TierError::MalformedCommand {
                        reason: format!("unknown keyword [{}]", unknown),
                    });
                }
            }
        }

        Ok(answer)
    }

    fn run_create(&mut self, tokens: &[String], pos: &mut usize) -> TierResult<KernelAnswer> {
        match next(tokens, pos)? {
            "database" => {
                let raw = next(tokens, pos)?;
                let name = ShortName::new(raw)?;

                let mut database = Database::create(name);
                database.save(&self.store)?;
                info!("Database [{}] create success", name);
                Ok(KernelAnswer::from_status(1))
            }
            "table" => {
                let raw = next(tokens, pos)?.to_string();
                let column_tokens = bracket_group(tokens, pos, "columns")?;

                let connection = self.require_connection()?;
                let mut guard = connection.lock().unwrap_or_else(|e| e.into_inner());
                if guard.resolve_table(&raw).is_some() {
                    return Err(TierError::DuplicateName {
                        kind: "Table",
                        name: raw,
                    });
                }

                let columns = compile_columns(&column_tokens)?;
                let table = Table::create(ShortName::new(&raw)?, columns)?;
                let table_name = table.name();

                guard.link_table(table_name)?;
                cache::global().tables.add(&self.store, TABLE_BASE, table);
                guard.save(&self.store)?;
                info!("Table [{}] create success", table_name);
                Ok(KernelAnswer::from_status(1))
            }
            other => Err(TierError::MalformedCommand {
                reason: format!("unknown create target [{}]", other),
            }),
        }
    }

    fn run_get(&mut self, tokens: &[String], pos: &mut usize) -> TierResult<KernelAnswer> {
        let table = next(tokens, pos)?.to_string();
        let connection = self.require_connection()?;

        match next(tokens, pos)? {
            "by_index" => {
                let index: u64 = parse_number(next(tokens, pos)?)?;
                let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
                let row = guard.get_row(&self.store, &table, index)?;
                if row[0] == PAGE_EMPTY {
                    return Err(TierError::RowNotFound { index });
                }
                Ok(KernelAnswer::with_body(index as i32, row))
            }
            "by_exp" => self.run_scan(&connection, &table, tokens, pos, RowLogic::Get),
            other => Err(TierError::MalformedCommand {
                reason: format!("unknown get selector [{}]", other),
            }),
        }
    }

    fn run_update(&mut self, tokens: &[String], pos: &mut usize) -> TierResult<KernelAnswer> {
        let table = next(tokens, pos)?.to_string();
        let data = next(tokens, pos)?.to_string();
        let connection = self.require_connection()?;

        match next(tokens, pos)? {
            "by_index" => {
                let index: u64 = parse_number(next(tokens, pos)?)?;
                let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
                guard.insert_row(&self.store, &table, index, data.as_bytes())?;
                Ok(KernelAnswer::from_status(1))
            }
            "by_exp" => self.run_scan(
                &connection,
                &table,
                tokens,
                pos,
                RowLogic::Update(data.as_bytes()),
            ),
            other => Err(TierError::MalformedCommand {
                reason: format!("unknown update selector [{}]", other),
            }),
        }
    }

    fn run_delete(&mut self, tokens: &[String], pos: &mut usize) -> TierResult<KernelAnswer> {
        match next(tokens, pos)? {
            "database" => {
                let connection = self.require_connection()?;
                {
                    let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
                    guard.delete(&self.store, true)?;
                }
                self.connection = None;
                info!("Current database was deleted successfully");
                Ok(KernelAnswer::from_status(1))
            }
            "table" => {
                let raw = next(tokens, pos)?.to_string();
                let connection = self.require_connection()?;
                let mut guard = connection.lock().unwrap_or_else(|e| e.into_inner());
                guard.delete_table(&self.store, &raw, true)?;
                guard.save(&self.store)?;
                Ok(KernelAnswer::from_status(1))
            }
            "row" => {
                let table = next(tokens, pos)?.to_string();
                let connection = self.require_connection()?;

                match next(tokens, pos)? {
                    "by_index" => {
                        let index: u64 = parse_number(next(tokens, pos)?)?;
                        let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
                        guard.delete_row(&self.store, &table, index)?;
                        Ok(KernelAnswer::from_status(1))
                    }
                    "by_exp" => {
                        self.run_scan(&connection, &table, tokens, pos, RowLogic::Delete)
                    }
                    other => Err(TierError::MalformedCommand {
                        reason: format!("unknown delete selector [{}]", other),
                    }),
                }
            }
            other => Err(TierError::MalformedCommand {
                reason: format!("unknown delete target [{}]", other),
            }),
        }
    }

    fn run_migrate(&mut self, tokens: &[String], pos: &mut usize) -> TierResult<KernelAnswer> {
        let src = next(tokens, pos)?.to_string();
        let dst = next(tokens, pos)?.to_string();
        let nav = bracket_group(tokens, pos, "nav")?;

        let connection = self.require_connection()?;
        let (src_table, dst_table) = {
            let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
            let src_resolved = guard.resolve_table(&src);
            if src_resolved.is_some() && src_resolved == guard.resolve_table(&dst) {
                return Err(TierError::MalformedCommand {
                    reason: "migration source and destination are the same table".to_string(),
                });
            }
            (
                guard.get_table(&self.store, &src)?,
                guard.get_table(&self.store, &dst)?,
            )
        };

        let src_guard = src_table.lock().unwrap_or_else(|e| e.into_inner());
        let mut dst_guard = dst_table.lock().unwrap_or_else(|e| e.into_inner());
        let copied = src_guard.migrate(&self.store, &mut dst_guard, &nav)?;
        info!("Migrated {} rows from [{}] to [{}]", copied, src, dst);
        Ok(KernelAnswer::from_status(copied as i32))
    }

    /// Sequential scan with predicate pushdown.
    ///
    /// Holds the table read lock for the duration of the scan; stops at
    /// the first index miss or once the match budget is spent.
    fn run_scan(
        &self,
        connection: &Arc<Mutex<Database>>,
        table_name: &str,
        tokens: &[String],
        pos: &mut usize,
        logic: RowLogic<'_>,
    ) -> TierResult<KernelAnswer> {
        let guard = connection.lock().unwrap_or_else(|e| e.into_inner());
        let table = guard.get_table(&self.store, table_name)?;

        let expression = {
            let tguard = table.lock().unwrap_or_else(|e| e.into_inner());
            let (expression, consumed) = Expression::compile(&tguard, &tokens[*pos..])?;
            *pos += consumed;
            expression
        };

        let worker = current_worker();
        {
            let tguard = table.lock().unwrap_or_else(|e| e.into_inner());
            if !tguard.lock.require_read(worker) {
                return Err(TierError::LockUnavailable {
                    kind: "Table",
                    name: table_name.to_string(),
                    worker,
                });
            }
        }

        let result = self.scan_rows(&guard, table_name, &expression, logic);

        let tguard = table.lock().unwrap_or_else(|e| e.into_inner());
        tguard.lock.release_read();
        result
    }

    fn scan_rows(
        &self,
        database: &Database,
        table: &str,
        expression: &Expression,
        logic: RowLogic<'_>,
    ) -> TierResult<KernelAnswer> {
        let mut body = Vec::new();
        let mut processed: i64 = 0;
        let mut index = expression.offset;

        loop {
            let row = match database.get_row(&self.store, table, index) {
                Ok(row) => row,
                Err(TierError::RowNotFound { .. }) => break,
                Err(e) => return Err(e),
            };

            if row[0] != PAGE_EMPTY && expression.evaluate(&row) {
                if expression.limit >= 0 && processed >= expression.limit {
                    break;
                }

                match logic {
                    RowLogic::Get => body.extend_from_slice(&row),
                    RowLogic::Update(data) => {
                        database.insert_row(&self.store, table, index, data)?
                    }
                    RowLogic::Delete => database.delete_row(&self.store, table, index)?,
                }
                processed += 1;
            }

            index += 1;
        }

        if body.is_empty() {
            Ok(KernelAnswer::from_status(processed as i32))
        } else {
            Ok(KernelAnswer::with_body(processed as i32, body))
        }
    }
}

impl Drop for Kernel {
    /// Best-effort durability barrier: the connected database and every
    /// cached container are written back before the kernel goes away.
    fn drop(&mut self) {
        if let Some(connection) = &self.connection {
            let mut guard = connection.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = guard.save(&self.store) {
                error!("Database [{}] save on shutdown failed: {}", guard.name(), e);
            }
        }

        if let Err(e) = cache::global().flush_all(&self.store) {
            error!("Cache write-back on shutdown failed: {}", e);
        }
    }
}

fn next<'a>(tokens: &'a [String], pos: &mut usize) -> TierResult<&'a str> {
    let token = tokens.get(*pos).ok_or_else(|| TierError::MalformedCommand {
        reason: "truncated token stream".to_string(),
    })?;
    *pos += 1;
    Ok(token.as_str())
}

fn expect_keyword(tokens: &[String], pos: &mut usize, keyword: &str) -> TierResult<()> {
    let token = next(tokens, pos)?;
    if token != keyword {
        return Err(TierError::MalformedCommand {
            reason: format!("expected [{}], found [{}]", keyword, token),
        });
    }
    Ok(())
}

/// Consumes `<keyword> ( token… )` and returns the bracketed tokens.
fn bracket_group(
    tokens: &[String],
    pos: &mut usize,
    keyword: &str,
) -> TierResult<Vec<String>> {
    expect_keyword(tokens, pos, keyword)?;
    expect_keyword(tokens, pos, "(")?;

    let mut group = Vec::new();
    loop {
        let token = next(tokens, pos)?;
        if token == ")" {
            break;
        }
        group.push(token.to_string());
    }
    Ok(group)
}

fn parse_number<T: std::str::FromStr>(token: &str) -> TierResult<T> {
    token.parse().map_err(|_| TierError::ParseError {
        reason: format!("invalid number [{}]", token),
    })
}
