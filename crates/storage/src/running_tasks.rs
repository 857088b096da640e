// SPDX-License-Identifier: MIT

//! `.state/running_tasks.json` — live snapshot rewritten on every dispatch
//! and reap, read by external GUIs.

use crate::atomic::write_atomic;
use chrono::{DateTime, Utc};
use qr_core::Priority;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningTaskEntry {
    pub id: String,
    pub tool: String,
    pub repo: String,
    pub started: DateTime<Utc>,
    pub file: String,
    pub priority: Priority,
    pub attempt: u32,
}

pub struct RunningTasksFile {
    path: PathBuf,
}

impl RunningTasksFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(&self, entries: &[RunningTaskEntry]) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(entries).unwrap_or_else(|_| b"[]".to_vec());
        write_atomic(&self.path, &bytes)
    }

    /// Rewrite as an empty array — used on orderly shutdown per the stop
    /// sentinel contract.
    pub fn clear(&self) -> std::io::Result<()> {
        self.write(&[])
    }
}

pub fn default_running_tasks_path(state_dir: &Path) -> PathBuf {
    state_dir.join("running_tasks.json")
}
