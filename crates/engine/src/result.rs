// SPDX-License-Identifier: MIT

//! The single state-mutation point for a completed task (spec §4.6 step
//! 6 "Reap"): updates the results map, the owning file's completion
//! count, releases the tool lock, moves the file to `done/`/`failed/`
//! once every task in it has finished, and re-enqueues recurring tasks.
//! Never writes ledger records itself — those are written per attempt by
//! whoever ran the process, or once by the caller for a synchronous
//! rejection.

use crate::fsutil::move_file;
use crate::layout::Layout;
use crate::state::{SchedulerState, TaskResult};
use chrono::{DateTime, Utc};
use qr_core::task::ValidatedTask;
use qr_policy::Policy;
use qr_storage::BreakerStore;

/// What happened to one dispatched task.
pub struct Disposition {
    pub task: ValidatedTask,
    pub source_file: String,
    pub success: bool,
    pub exit: i32,
    pub reason: Option<String>,
}

pub fn record_result(
    state: &mut SchedulerState,
    layout: &Layout,
    policy: &Policy,
    breaker: &mut BreakerStore,
    now: DateTime<Utc>,
    d: Disposition,
) -> std::io::Result<()> {
    state.tool_locks.remove(&d.task.tool);
    state.running.remove(&d.task.id);
    state.pending.remove(&d.task.id);

    if d.success {
        let _ = breaker.record_success(&d.task.tool);
    } else {
        let _ = breaker.record_failure(
            &d.task.tool,
            policy.circuit_breaker.window_failures,
            policy.circuit_breaker.open_seconds,
            now,
        );
    }

    state.results.insert(
        d.task.id.clone(),
        TaskResult { success: d.success, exit: d.exit, reason: d.reason.clone() },
    );

    if let Some(ctx) = state.file_contexts.get_mut(&d.source_file) {
        ctx.completed += 1;
        if !d.success {
            ctx.failures += 1;
        }
        if ctx.is_complete() {
            let dest_dir = if ctx.failures > 0 { layout.failed() } else { layout.done() };
            let from = layout.processing().join(&d.source_file);
            let to = dest_dir.join(&d.source_file);
            move_file(&from, &to)?;
            state.file_contexts.remove(&d.source_file);
        }
    }

    if d.success && d.task.recurring_minutes > 0 {
        reenqueue_recurring(layout, &d.task, now)?;
    }

    Ok(())
}

fn reenqueue_recurring(
    layout: &Layout,
    task: &ValidatedTask,
    now: DateTime<Utc>,
) -> std::io::Result<()> {
    let suffix = now.format("%H%M%S").to_string();
    let clone = task.as_recurring_clone(now, &suffix);
    let raw = clone.to_raw_task();
    let mut line = serde_json::to_string(&raw).unwrap_or_default();
    line.push('\n');
    let filename = format!("recur_{}_{}.jsonl", task.id.as_str(), suffix);
    std::fs::create_dir_all(layout.inbox())?;
    std::fs::write(layout.inbox().join(filename), line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FileContext, RunningJob};
    use qr_core::{Priority, TaskId};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn layout(dir: &std::path::Path) -> Layout {
        Layout::new(dir.to_path_buf(), dir.join(".tasks"), dir.join("logs"))
    }

    fn task(id: &str, recurring_minutes: u64) -> ValidatedTask {
        ValidatedTask {
            id: TaskId::from(id),
            tool: "git".to_string(),
            repo: PathBuf::from("/repo"),
            priority: Priority::Normal,
            args: vec![],
            flags: vec![],
            files: vec![],
            prompt: None,
            max_retries: 0,
            backoff_sec: 0,
            backoff_max: 0,
            jitter_sec: 0,
            attempt: 0,
            depends_on: BTreeSet::new(),
            run_at: None,
            recurring_minutes,
            timeout_sec: 0,
        }
    }

    #[test]
    fn completing_last_task_in_file_moves_it_to_done() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.processing().join("s1.jsonl"), "{}").unwrap();

        let mut state = SchedulerState::new();
        state.file_contexts.insert(
            "s1.jsonl".to_string(),
            FileContext { filename: "s1.jsonl".to_string(), total: 1, completed: 0, failures: 0 },
        );
        state.running.insert(
            TaskId::from("t1"),
            RunningJob {
                tool: "git".to_string(),
                repo: PathBuf::from("/repo"),
                source_file: "s1.jsonl".to_string(),
                priority: Priority::Normal,
                attempt: 1,
                started: Utc::now(),
            },
        );

        let mut breaker = BreakerStore::load(layout.breaker_path());
        let policy = Policy::default();
        let now = Utc::now();
        record_result(
            &mut state,
            &layout,
            &policy,
            &mut breaker,
            now,
            Disposition { task: task("t1", 0), source_file: "s1.jsonl".to_string(), success: true, exit: 0, reason: None },
        )
        .unwrap();

        assert!(layout.done().join("s1.jsonl").exists());
        assert!(!state.file_contexts.contains_key("s1.jsonl"));
        assert!(state.results["t1"].success);
    }

    #[test]
    fn one_failure_routes_whole_file_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.processing().join("s2.jsonl"), "{}\n{}\n").unwrap();

        let mut state = SchedulerState::new();
        state.file_contexts.insert(
            "s2.jsonl".to_string(),
            FileContext { filename: "s2.jsonl".to_string(), total: 2, completed: 1, failures: 0 },
        );

        let mut breaker = BreakerStore::load(layout.breaker_path());
        let policy = Policy::default();
        let now = Utc::now();
        record_result(
            &mut state,
            &layout,
            &policy,
            &mut breaker,
            now,
            Disposition { task: task("t2", 0), source_file: "s2.jsonl".to_string(), success: false, exit: 1, reason: Some("boom".into()) },
        )
        .unwrap();

        assert!(layout.failed().join("s2.jsonl").exists());
    }

    #[test]
    fn recurring_task_writes_a_fresh_inbox_line() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.processing().join("s3.jsonl"), "{}").unwrap();

        let mut state = SchedulerState::new();
        state.file_contexts.insert(
            "s3.jsonl".to_string(),
            FileContext { filename: "s3.jsonl".to_string(), total: 1, completed: 0, failures: 0 },
        );
        let mut breaker = BreakerStore::load(layout.breaker_path());
        let policy = Policy::default();
        let now = Utc::now();
        record_result(
            &mut state,
            &layout,
            &policy,
            &mut breaker,
            now,
            Disposition { task: task("t3", 30), source_file: "s3.jsonl".to_string(), success: true, exit: 0, reason: None },
        )
        .unwrap();

        let reenqueued: Vec<_> = std::fs::read_dir(layout.inbox()).unwrap().collect();
        assert_eq!(reenqueued.len(), 1);
    }

    #[test]
    fn recurring_task_does_not_reenqueue_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.processing().join("s4.jsonl"), "{}").unwrap();

        let mut state = SchedulerState::new();
        state.file_contexts.insert(
            "s4.jsonl".to_string(),
            FileContext { filename: "s4.jsonl".to_string(), total: 1, completed: 0, failures: 0 },
        );
        let mut breaker = BreakerStore::load(layout.breaker_path());
        let policy = Policy::default();
        let now = Utc::now();
        record_result(
            &mut state,
            &layout,
            &policy,
            &mut breaker,
            now,
            Disposition { task: task("t4", 30), source_file: "s4.jsonl".to_string(), success: false, exit: 1, reason: None },
        )
        .unwrap();

        assert!(layout.inbox().read_dir().unwrap().next().is_none());
    }
}
