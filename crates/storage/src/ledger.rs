// SPDX-License-Identifier: MIT

//! Append-only JSON-lines attempt ledger.
//!
//! Writers serialize through an advisory exclusive lock on the ledger file
//! itself (`fs2::FileExt::lock_exclusive`), matching the REDESIGN FLAGS
//! guidance to replace the source's named OS mutex with a portable
//! `flock`/`LockFileEx` lock. After each append the file is rotated to
//! `archive/` if it exceeds the configured size cap.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error writing ledger: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not acquire ledger lock within {0:?}")]
    LockTimeout(Duration),
}

/// One line of `logs/ledger.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub ts: DateTime<Utc>,
    pub id: String,
    pub tool: String,
    pub attempt: u32,
    pub exit: i32,
    pub ok: bool,
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LedgerRecord {
    pub fn parse_failure(ts: DateTime<Utc>, note: impl Into<String>) -> Self {
        Self {
            ts,
            id: "parse".to_string(),
            tool: String::new(),
            attempt: 0,
            exit: 999,
            ok: false,
            repo: String::new(),
            duration_ms: None,
            note: Some(note.into()),
        }
    }
}

const LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const LOCK_POLL: Duration = Duration::from_millis(20);

/// Append-only ledger file with rotation. Cheap to clone: every append
/// opens the file fresh and locks at the OS level, so each clone can be
/// handed to its own spawned task without shared mutable state.
#[derive(Clone)]
pub struct Ledger {
    path: PathBuf,
    archive_dir: PathBuf,
    rotate_max_bytes: u64,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, rotate_max_mb: u64) -> Self {
        let path = path.into();
        let archive_dir =
            path.parent().unwrap_or_else(|| Path::new(".")).join("archive");
        Self { path, archive_dir, rotate_max_bytes: rotate_max_mb * 1024 * 1024 }
    }

    /// Append one record, serialized locked against concurrent appenders
    /// (including other processes), then rotate if oversized.
    pub fn append(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file =
            OpenOptions::new().create(true).append(true).open(&self.path)?;

        let waited = std::time::Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if waited.elapsed() < LOCK_TIMEOUT => {
                    std::thread::sleep(LOCK_POLL);
                }
                Err(_) => return Err(LedgerError::LockTimeout(LOCK_TIMEOUT)),
            }
        }

        let mut line = serde_json::to_string(record).unwrap_or_else(|_| {
            // Serialization of this fixed, all-primitive struct cannot fail
            // in practice; fall back to a minimal line rather than losing
            // the attempt entirely.
            format!("{{\"id\":\"{}\",\"exit\":{},\"ok\":false}}", record.id, record.exit)
        });
        line.push('\n');
        let result = file.write_all(line.as_bytes());
        let _ = file.unlock();
        result?;

        self.rotate_if_needed()?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<(), LedgerError> {
        let size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if size <= self.rotate_max_bytes {
            return Ok(());
        }
        std::fs::create_dir_all(&self.archive_dir)?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("ledger.jsonl");
        let dest = self.archive_dir.join(format!("{name}.{stamp}"));
        std::fs::rename(&self.path, &dest)?;
        // Touch a fresh empty ledger so the next append creates it cleanly.
        std::fs::File::create(&self.path)?;
        Ok(())
    }
}
