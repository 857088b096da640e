// SPDX-License-Identifier: MIT

//! Pure selection logic for step (5) of the scheduler loop (spec §4.6):
//! which pending entries are ready to run, and which are permanently
//! blocked by a failed dependency.

use crate::state::{EntryState, SchedulerState};
use chrono::{DateTime, Utc};
use qr_core::TaskId;

/// Entries whose `tool` is free *as of the start of this tick*, whose
/// `run_at` (if any) has arrived, and whose dependencies have all
/// *succeeded*, sorted `(priority desc, added asc, seq asc)` so ties
/// resolve in ingest order.
///
/// This does not dedupe by tool: two pending entries for the same
/// never-yet-locked tool both pass the filter and both come back here in
/// the same batch. That is intentional — this function only ever sees a
/// snapshot of `state` taken before dispatch starts acquiring locks.
/// Enforcing "at most one running per tool" is the caller's job: the
/// scheduler's dispatch loop re-checks `tool_locks` immediately before
/// acquiring it for each entry in turn, so only the first one in this
/// list for a given tool actually dispatches (spec §4.6 "Tool locks").
pub fn select_ready(state: &SchedulerState, now: DateTime<Utc>, capacity: usize) -> Vec<TaskId> {
    if state.running_count() >= capacity {
        return Vec::new();
    }

    let mut ready: Vec<_> = state
        .pending
        .values()
        .filter(|e| e.state == EntryState::Pending)
        .filter(|e| !state.tool_locks.contains_key(&e.task.tool))
        .filter(|e| e.task.run_at.map_or(true, |t| now >= t))
        .filter(|e| {
            e.task
                .depends_on
                .iter()
                .all(|d| matches!(state.results.get(d), Some(r) if r.success))
        })
        .collect();

    ready.sort_by(|a, b| {
        b.task
            .priority
            .cmp(&a.task.priority)
            .then(a.added.cmp(&b.added))
            .then(a.seq.cmp(&b.seq))
    });

    ready.into_iter().take(capacity - state.running_count()).map(|e| e.task.id.clone()).collect()
}

/// Pending entries at least one of whose dependencies has *failed* —
/// these can never become ready and are dispatched immediately as
/// exit-409 dependency failures (spec §4.6 "Dependencies").
pub fn blocked_by_failed_dependency(state: &SchedulerState) -> Vec<TaskId> {
    state
        .pending
        .values()
        .filter(|e| e.state == EntryState::Pending)
        .filter(|e| {
            e.task
                .depends_on
                .iter()
                .any(|d| matches!(state.results.get(d), Some(r) if !r.success))
        })
        .map(|e| e.task.id.clone())
        .collect()
}
