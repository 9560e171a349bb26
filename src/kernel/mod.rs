// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Query kernel.
//!
//! Parses the positional token language, compiles row predicates, and
//! dispatches mutations against the connected database:
//!
//! ```text
//! append row BOOKS values <data>
//! get row BOOKS by_exp column pages > 10 and column title eq Sea limit 5
//! delete row BOOKS by_index 3
//! ```
//!
//! The kernel owns the active connection and the content store; the CLI
//! binary wraps one kernel instance behind a process-wide handle.

pub mod answer;
pub mod command;
pub mod expression;

#[cfg(test)]
mod command_test;

// Re-export public API
pub use answer::KernelAnswer;
pub use command::{Kernel, KERNEL_VERSION};
pub use expression::{CompareOp, Condition, Connective, Expression, RowLogic, MAX_STATEMENTS};
