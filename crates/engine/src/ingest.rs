// SPDX-License-Identifier: MIT

//! Step (6) of the scheduler loop (spec §4.6): ingest one inbox file,
//! oldest first, decoding and validating each line, diverting to
//! `failed/` on parse/validation failure or `quarantine/` if the
//! breaker is open for a task's tool.

use crate::fsutil::move_file;
use crate::layout::Layout;
use crate::state::{EntryState, FileContext, PendingEntry, SchedulerState};
use chrono::{DateTime, Utc};
use qr_core::task::{Task, ValidatedTask};
use qr_policy::Policy;
use qr_storage::{BreakerStore, Ledger, LedgerRecord};
use std::path::Path;
use tracing::info;

/// Ingest the single oldest `*.jsonl` file in `inbox/`, if any. Returns
/// `true` if a file was processed (regardless of its final disposition).
pub fn ingest_one(
    state: &mut SchedulerState,
    layout: &Layout,
    policy: &Policy,
    breaker: &BreakerStore,
    ledger: &Ledger,
    now: DateTime<Utc>,
) -> std::io::Result<bool> {
    let Some(filename) = oldest_inbox_file(layout)? else {
        return Ok(false);
    };

    let inbox_path = layout.inbox().join(&filename);
    let processing_path = layout.processing().join(&filename);
    std::fs::create_dir_all(layout.processing())?;
    std::fs::rename(&inbox_path, &processing_path)?;

    let contents = std::fs::read_to_string(&processing_path)?;
    let mut accepted = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let raw: Task = match serde_json::from_str(line) {
            Ok(t) => t,
            Err(e) => {
                finish_as_parse_failure(layout, ledger, &processing_path, &filename, now, format!("bad json: {e}"))?;
                return Ok(true);
            }
        };
        let validated = match ValidatedTask::validate(raw, policy.retry_defaults(), &layout.repo) {
            Ok(t) => t,
            Err(e) => {
                finish_as_parse_failure(
                    layout,
                    ledger,
                    &processing_path,
                    &filename,
                    now,
                    format!("bad json: {e}"),
                )?;
                return Ok(true);
            }
        };
        if breaker.is_open(&validated.tool, now) {
            move_file(&processing_path, &layout.quarantine().join(&filename))?;
            info!(file = %filename, tool = %validated.tool, "circuit breaker open, quarantining file");
            return Ok(true);
        }
        accepted.push(validated);
    }

    if accepted.is_empty() {
        move_file(&processing_path, &layout.done().join(&filename))?;
        return Ok(true);
    }

    state.file_contexts.insert(
        filename.clone(),
        FileContext { filename: filename.clone(), total: accepted.len(), completed: 0, failures: 0 },
    );
    for task in accepted {
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.insert(
            task.id.clone(),
            PendingEntry { task, source_file: filename.clone(), state: EntryState::Pending, added: now, seq },
        );
    }
    Ok(true)
}

fn finish_as_parse_failure(
    layout: &Layout,
    ledger: &Ledger,
    processing_path: &Path,
    filename: &str,
    now: DateTime<Utc>,
    note: String,
) -> std::io::Result<()> {
    let _ = ledger.append(&LedgerRecord::parse_failure(now, note));
    move_file(processing_path, &layout.failed().join(filename))
}

fn oldest_inbox_file(layout: &Layout) -> std::io::Result<Option<String>> {
    std::fs::create_dir_all(layout.inbox())?;
    let mut candidates: Vec<(std::time::SystemTime, String)> = Vec::new();
    for entry in std::fs::read_dir(layout.inbox())? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let modified = entry.metadata()?.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            candidates.push((modified, name.to_string()));
        }
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(candidates.into_iter().next().map(|(_, name)| name))
}
