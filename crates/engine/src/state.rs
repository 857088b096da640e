// SPDX-License-Identifier: MIT

//! Scheduler-owned in-memory state: pending entries, running jobs, tool
//! locks, task results, and file contexts (spec §3 "Ownership").

use chrono::{DateTime, Utc};
use qr_core::task::ValidatedTask;
use qr_core::{Priority, TaskId};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Running,
    Complete,
}

/// Bookkeeping for one ingested inbox file (spec §3 "File Context").
#[derive(Debug, Clone)]
pub struct FileContext {
    pub filename: String,
    pub total: usize,
    pub completed: usize,
    pub failures: usize,
}

impl FileContext {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// A [`ValidatedTask`] plus the bookkeeping the scheduler hangs off it.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub task: ValidatedTask,
    pub source_file: String,
    pub state: EntryState,
    pub added: DateTime<Utc>,
    /// Monotonic ingest-order tiebreaker so dispatch order is stable even
    /// when several tasks share the same `added` timestamp (spec §5:
    /// "tasks appear in the pending set in file order").
    pub seq: u64,
}

#[derive(Debug, Clone)]
pub struct RunningJob {
    pub tool: String,
    pub repo: PathBuf,
    pub source_file: String,
    pub priority: Priority,
    pub attempt: u32,
    pub started: DateTime<Utc>,
}

/// In-memory disposition of a completed task, keyed by id; dependents
/// consult this map (spec §4.6 "Dependencies").
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub success: bool,
    pub exit: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
pub struct SchedulerState {
    pub pending: BTreeMap<TaskId, PendingEntry>,
    pub running: BTreeMap<TaskId, RunningJob>,
    pub tool_locks: BTreeMap<String, TaskId>,
    pub results: BTreeMap<TaskId, TaskResult>,
    pub file_contexts: BTreeMap<String, FileContext>,
    pub next_seq: u64,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}
