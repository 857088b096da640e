// SPDX-License-Identifier: MIT

//! Per-task log file: `logs/task_<id>.log`, appended to by each attempt.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;

pub fn append_attempt_header(log_path: &Path, attempt: u32, now: DateTime<Utc>) -> std::io::Result<()> {
    append_line(log_path, &format!("=== Attempt {attempt} @ {} ===", now.to_rfc3339()))
}

pub fn append_line(log_path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "{line}")
}
