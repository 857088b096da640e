// SPDX-License-Identifier: MIT

//! `.state/heartbeat.json` — rewritten every scheduler tick, read by the
//! supervisor to decide whether the worker is alive.

use crate::atomic::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
    pub running: u32,
    pub max: u32,
}

impl Heartbeat {
    pub fn write(path: &Path, running: u32, max: u32, now: DateTime<Utc>) -> std::io::Result<()> {
        let hb = Heartbeat { timestamp: now, pid: std::process::id(), running, max };
        let bytes = serde_json::to_vec_pretty(&hb).unwrap_or_default();
        write_atomic(path, &bytes)
    }

    pub fn read(path: &Path) -> std::io::Result<Heartbeat> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// True when the heartbeat's timestamp is within `stale_after` of `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, stale_after: std::time::Duration) -> bool {
        let age = now - self.timestamp;
        let limit = chrono::Duration::from_std(stale_after)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        age <= limit
    }
}

pub fn default_heartbeat_path(state_dir: &Path) -> PathBuf {
    state_dir.join("heartbeat.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heartbeat.json");
        let now = Utc::now();
        Heartbeat::write(&path, 2, 4, now).unwrap();
        let hb = Heartbeat::read(&path).unwrap();
        assert_eq!(hb.running, 2);
        assert_eq!(hb.max, 4);
        assert_eq!(hb.timestamp, now);
    }

    #[test]
    fn freshness_check() {
        let now = Utc::now();
        let hb = Heartbeat { timestamp: now, pid: 1, running: 0, max: 1 };
        assert!(hb.is_fresh(now + chrono::Duration::seconds(10), std::time::Duration::from_secs(20)));
        assert!(!hb.is_fresh(now + chrono::Duration::seconds(30), std::time::Duration::from_secs(20)));
    }
}
