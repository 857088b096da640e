// SPDX-License-Identifier: MIT

//! Age-based pruning of rotated ledger archives and per-task logs.
//!
//! The source documents `Queue.LogKeepDays` but, per the spec's open
//! question, never enforces it. This implementation resolves that
//! question by enforcing it: both `logs/archive/*` and `logs/task_*.log`
//! older than the configured number of days are deleted on each self-heal
//! tick.

use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Delete files directly under `dir` whose mtime is older than `max_age`.
/// Missing directories are treated as nothing-to-prune, not an error.
pub fn prune_older_than(dir: &Path, max_age: Duration) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let mut pruned = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let age = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|m| m.elapsed().ok());
        if let Some(age) = age {
            if age > max_age {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to prune aged file");
                } else {
                    pruned += 1;
                }
            }
        }
    }
    pruned
}

/// Prune both the ledger archive directory and the per-task log directory
/// under `logs_dir`, keeping only files newer than `keep_days`.
pub fn prune_logs(logs_dir: &Path, keep_days: u64) -> usize {
    let max_age = Duration::from_secs(keep_days * 24 * 60 * 60);
    let mut pruned = prune_older_than(&logs_dir.join("archive"), max_age);
    pruned += prune_task_logs(logs_dir, max_age);
    pruned
}

fn prune_task_logs(logs_dir: &Path, max_age: Duration) -> usize {
    let Ok(entries) = std::fs::read_dir(logs_dir) else {
        return 0;
    };
    let mut pruned = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_task_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("task_") && n.ends_with(".log"));
        if !is_task_log {
            continue;
        }
        let age = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|m| m.elapsed().ok());
        if age.is_some_and(|a| a > max_age) {
            if std::fs::remove_file(&path).is_ok() {
                pruned += 1;
            }
        }
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_prunes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert_eq!(prune_older_than(&missing, Duration::from_secs(1)), 0);
    }

    #[test]
    fn fresh_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("ledger.jsonl.20260101"), b"x").unwrap();
        let pruned = prune_older_than(&path, Duration::from_secs(60 * 60 * 24 * 365));
        assert_eq!(pruned, 0);
        assert!(path.join("ledger.jsonl.20260101").exists());
    }

    #[test]
    fn prune_logs_only_touches_archive_and_task_logs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("archive")).unwrap();
        std::fs::write(dir.path().join("task_abc.log"), b"x").unwrap();
        std::fs::write(dir.path().join("ledger.jsonl"), b"x").unwrap();
        let pruned = prune_logs(dir.path(), 9999);
        assert_eq!(pruned, 0);
        assert!(dir.path().join("ledger.jsonl").exists());
        assert!(dir.path().join("task_abc.log").exists());
    }
}
