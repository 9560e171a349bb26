// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Column descriptors and their positional-token compiler.
//!
//! A column carries a packed type byte ({primary | data-type |
//! auto-increment}), a byte width, a name, and (only for MODULE columns)
//! a module binding (module name, query string, load phase). Descriptors
//! compile from the flat token stream
//! `( name size typespec primary_flag autoinc_flag )*` of the
//! `create table` command.

use crate::error::{TierError, TierResult};

/// Fixed width of a persisted column name.
pub const COLUMN_NAME_SIZE: usize = 16;
/// Fixed width of a persisted module name.
pub const MODULE_NAME_SIZE: usize = 8;
/// Fixed width of a persisted module query string.
pub const MODULE_QUERY_SIZE: usize = 24;

/// Type-byte bit layout.
const PRIMARY_BIT: u8 = 0b1000_0000;
const AUTO_INC_BIT: u8 = 0b0100_0000;
const TYPE_MASK: u8 = 0b0000_1111;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    String,
    Any,
    Module,
}

impl DataType {
    fn code(self) -> u8 {
        match self {
            DataType::Int => 1,
            DataType::String => 2,
            DataType::Any => 3,
            DataType::Module => 4,
        }
    }

    fn from_code(code: u8) -> TierResult<Self> {
        match code {
            1 => Ok(DataType::Int),
            2 => Ok(DataType::String),
            3 => Ok(DataType::Any),
            4 => Ok(DataType::Module),
            _ => Err(TierError::ParseError {
                reason: format!("unknown column data type code {}", code),
            }),
        }
    }
}

/// Module load phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulePhase {
    Preload,
    Postload,
    Both,
}

impl ModulePhase {
    fn code(self) -> u8 {
        match self {
            ModulePhase::Preload => 1,
            ModulePhase::Postload => 2,
            ModulePhase::Both => 3,
        }
    }

    fn from_code(code: u8) -> TierResult<Self> {
        match code {
            1 => Ok(ModulePhase::Preload),
            2 => Ok(ModulePhase::Postload),
            3 => Ok(ModulePhase::Both),
            _ => Err(TierError::ParseError {
                reason: format!("unknown module phase code {}", code),
            }),
        }
    }
}

/// Module metadata, present iff the data type is [`DataType::Module`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBinding {
    pub name: String,
    pub query: String,
    pub phase: ModulePhase,
}

/// Column descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub size: u16,
    pub data_type: DataType,
    pub primary: bool,
    pub auto_increment: bool,
    pub module: Option<ModuleBinding>,
}

/// Resolved position of a column within a row, computed at expression
/// compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub offset: usize,
    pub size: usize,
}

impl Column {
    /// Serialised descriptor size in bytes, before codec widening.
    ///
    /// ```text
    /// Offset  Size  Field
    /// ------  ----  -----
    /// 0       1     type byte (primary | data-type | auto-inc)
    /// 1       2     size
    /// 3       16    name (NUL-padded)
    /// 19      8     module name (NUL-padded)
    /// 27      24    module query (NUL-padded)
    /// 51      1     module phase (0 when not a module column)
    /// ```
    pub const RECORD_SIZE: usize = 52;

    /// Packed {primary | data-type | auto-increment} byte.
    pub fn type_byte(&self) -> u8 {
        let mut byte = self.data_type.code() & TYPE_MASK;
        if self.primary {
            byte |= PRIMARY_BIT;
        }
        if self.auto_increment {
            byte |= AUTO_INC_BIT;
        }
        byte
    }

    pub(crate) fn to_bytes(&self) -> [u8; Self::RECORD_SIZE] {
        let mut buf = [0u8; Self::RECORD_SIZE];
        buf[0] = self.type_byte();
        buf[1..3].copy_from_slice(&self.size.to_le_bytes());
        write_padded(&mut buf[3..3 + COLUMN_NAME_SIZE], &self.name);
        if let Some(module) = &self.module {
            write_padded(&mut buf[19..19 + MODULE_NAME_SIZE], &module.name);
            write_padded(&mut buf[27..27 + MODULE_QUERY_SIZE], &module.query);
            buf[51] = module.phase.code();
        }
        buf
    }

    pub(crate) fn from_bytes(buf: &[u8]) -> TierResult<Self> {
        if buf.len() < Self::RECORD_SIZE {
            return Err(TierError::ParseError {
                reason: "column record truncated".to_string(),
            });
        }

        let type_byte = buf[0];
        let data_type = DataType::from_code(type_byte & TYPE_MASK)?;
        let size = u16::from_le_bytes([buf[1], buf[2]]);
        if size == 0 {
            return Err(TierError::SchemaViolation {
                reason: "column size must be positive".to_string(),
            });
        }

        let module = if data_type == DataType::Module {
            Some(ModuleBinding {
                name: read_padded(&buf[19..19 + MODULE_NAME_SIZE]),
                query: read_padded(&buf[27..27 + MODULE_QUERY_SIZE]),
                phase: ModulePhase::from_code(buf[51])?,
            })
        } else {
            None
        };

        Ok(Self {
            name: read_padded(&buf[3..3 + COLUMN_NAME_SIZE]),
            size,
            data_type,
            primary: type_byte & PRIMARY_BIT != 0,
            auto_increment: type_byte & AUTO_INC_BIT != 0,
            module,
        })
    }
}

fn write_padded(target: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(target.len());
    target[..n].copy_from_slice(&bytes[..n]);
}

fn read_padded(source: &[u8]) -> String {
    let end = source.iter().position(|b| *b == 0).unwrap_or(source.len());
    String::from_utf8_lossy(&source[..end]).into_owned()
}

/// Parses a `typespec` token.
///
/// The literals `int`, `str` and `any` map to the builtin types; anything
/// else is a module binding `module=query[,phase]` with the phase literal
/// in {`mpre`, `mpost`, `both`} and POSTLOAD as the default.
fn parse_typespec(token: &str) -> TierResult<(DataType, Option<ModuleBinding>)> {
    match token {
        "int" => return Ok((DataType::Int, None)),
        "str" => return Ok((DataType::String, None)),
        "any" => return Ok((DataType::Any, None)),
        _ => {}
    }

    let (module_name, rest) = token.split_once('=').ok_or_else(|| TierError::ParseError {
        reason: format!("typespec [{}] is neither builtin nor module binding", token),
    })?;

    let (query, phase) = match rest.split_once(',') {
        Some((query, phase_token)) => {
            let phase = match phase_token {
                "mpre" => ModulePhase::Preload,
                "mpost" => ModulePhase::Postload,
                "both" => ModulePhase::Both,
                _ => ModulePhase::Postload,
            };
            (query, phase)
        }
        None => (rest, ModulePhase::Postload),
    };

    Ok((
        DataType::Module,
        Some(ModuleBinding {
            name: truncate(module_name, MODULE_NAME_SIZE),
            query: truncate(query, MODULE_QUERY_SIZE),
            phase,
        }),
    ))
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Compiles column descriptors from the positional token stream.
///
/// ## Input
/// - `tokens`: Flat stream of 5-token groups
///   `name size typespec primary_flag autoinc_flag`
///
/// ## Output
/// - `Ok(Vec<Column>)`: One descriptor per group, in order
/// - `Err(TierError::MalformedCommand)`: Stream length not a multiple of 5
/// - `Err(TierError::ParseError)`: Bad size or typespec
///
/// ## Example
/// ```
/// use tierbase::container::compile_columns;
///
/// let tokens = ["title", "32", "str", "np", "na"];
/// let columns = compile_columns(&tokens.map(String::from)).unwrap();
/// assert_eq!(columns[0].size, 32);
/// ```
pub fn compile_columns(tokens: &[String]) -> TierResult<Vec<Column>> {
    if tokens.len() % 5 != 0 {
        return Err(TierError::MalformedCommand {
            reason: format!(
                "column stream holds {} tokens, expected groups of 5",
                tokens.len()
            ),
        });
    }

    let mut columns = Vec::with_capacity(tokens.len() / 5);
    for group in tokens.chunks_exact(5) {
        let size: u16 = group[1].parse().map_err(|_| TierError::ParseError {
            reason: format!("invalid column size [{}]", group[1]),
        })?;
        if size == 0 {
            return Err(TierError::SchemaViolation {
                reason: format!("column [{}] size must be positive", group[0]),
            });
        }

        let (data_type, module) = parse_typespec(&group[2])?;

        columns.push(Column {
            name: truncate(&group[0], COLUMN_NAME_SIZE),
            size,
            data_type,
            primary: group[3] == "primary",
            auto_increment: group[4] == "auto_inc",
            module,
        });
    }

    Ok(columns)
}
