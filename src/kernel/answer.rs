// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Kernel answers.
//!
//! Every processed command stream produces one answer: a status code, a
//! body size (−1 when the command produces no body), and an optional
//! opaque body. Negative codes map one-to-one onto the error taxonomy.

use crate::error::TierError;

/// Result of a processed command stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelAnswer {
    /// Operation status; for by-index fetches, the row index. Negative on
    /// error.
    pub code: i32,

    /// Byte length of the body, or −1 when there is none.
    pub size: i32,

    /// Opaque answer payload.
    pub body: Option<Vec<u8>>,
}

impl KernelAnswer {
    /// Bodyless success answer.
    pub fn from_status(code: i32) -> Self {
        Self {
            code,
            size: -1,
            body: None,
        }
    }

    /// Answer carrying a payload.
    pub fn with_body(code: i32, body: Vec<u8>) -> Self {
        Self {
            code,
            size: body.len() as i32,
            body: Some(body),
        }
    }

    /// Error answer with the taxonomy code and no body.
    pub fn from_error(error: &TierError) -> Self {
        Self {
            code: error.answer_code(),
            size: -1,
            body: None,
        }
    }

    /// True when the code signals success.
    pub fn is_ok(&self) -> bool {
        self.code >= 0
    }

    /// Process exit code: 0 on success, the negated error code otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_ok() {
            0
        } else {
            -self.code
        }
    }
}

impl Default for KernelAnswer {
    fn default() -> Self {
        Self::from_status(0)
    }
}
