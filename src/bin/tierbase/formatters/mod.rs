// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Answer output formatting.

use serde_json::json;
use tierbase::kernel::KernelAnswer;

/// Plain-text rendering: status line plus the body, when present.
pub fn format_text(answer: &KernelAnswer) -> String {
    match &answer.body {
        Some(body) => format!(
            "code={} size={}\n{}",
            answer.code,
            answer.size,
            String::from_utf8_lossy(body)
        ),
        None => format!("code={} size={}", answer.code, answer.size),
    }
}

/// JSON rendering, body as a lossy UTF-8 string.
pub fn format_json(answer: &KernelAnswer) -> String {
    let value = json!({
        "code": answer.code,
        "size": answer.size,
        "body": answer
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned()),
    });
    value.to_string()
}
