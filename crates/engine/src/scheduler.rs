// SPDX-License-Identifier: MIT

//! The scheduler: owns every piece of in-memory and on-disk state for one
//! worker and drives the per-tick loop described in spec §4.6 — self-heal,
//! ingest, dependency-failure sweep, dispatch, reap, heartbeat, snapshot.

use crate::dispatch::{blocked_by_failed_dependency, select_ready};
use crate::ingest::ingest_one;
use crate::layout::Layout;
use crate::result::{record_result, Disposition};
use crate::self_heal::{clear_stale_git_lock, recover_stale_processing};
use crate::state::SchedulerState;
use chrono::{DateTime, Utc};
use qr_core::{Clock, TaskId};
use qr_policy::Policy;
use qr_resolver::CommandResolver;
use qr_storage::{prune, BreakerStore, Heartbeat, Ledger, LedgerRecord, RunningTaskEntry, RunningTasksFile};
use std::time::Duration;
use tokio::sync::mpsc;

/// One worker's complete runtime: configuration, durable stores, and the
/// in-memory scheduler state, parameterized over [`Clock`] so tests can
/// drive it with a [`qr_core::FakeClock`].
pub struct Scheduler<C: Clock> {
    layout: Layout,
    policy: Policy,
    resolver: CommandResolver,
    ledger: Ledger,
    breaker: BreakerStore,
    running_tasks_file: RunningTasksFile,
    state: SchedulerState,
    clock: C,
    completions_tx: mpsc::UnboundedSender<Disposition>,
    completions_rx: mpsc::UnboundedReceiver<Disposition>,
    last_heartbeat_at: Option<DateTime<Utc>>,
}

impl<C: Clock> Scheduler<C> {
    /// Build a scheduler rooted at `layout`, creating every directory it
    /// names and loading durable state (circuit breakers) from disk.
    pub fn new(layout: Layout, policy: Policy, clock: C) -> std::io::Result<Self> {
        layout.ensure_dirs()?;
        let resolver = CommandResolver::load(&layout.plugins_dir);
        let ledger = Ledger::new(layout.ledger_path(), policy.queue.log_rotate_max_mb);
        let breaker = BreakerStore::load(layout.breaker_path());
        let running_tasks_file = RunningTasksFile::new(layout.running_tasks_path());
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Ok(Self {
            layout,
            policy,
            resolver,
            ledger,
            breaker,
            running_tasks_file,
            state: SchedulerState::new(),
            clock,
            completions_tx,
            completions_rx,
            last_heartbeat_at: None,
        })
    }

    pub fn has_in_flight(&self) -> bool {
        !self.state.running.is_empty()
    }

    pub fn stop_sentinel_present(&self) -> bool {
        self.layout.stop_sentinel().exists()
    }

    /// Called once before the first tick, and safe to call again on every
    /// restart under a supervisor: recovers any `processing/` file left
    /// behind by a previous crash.
    pub fn self_heal_startup(&mut self) -> std::io::Result<usize> {
        let now = self.clock.now();
        recover_stale_processing(
            &self.layout,
            Duration::from_secs(self.policy.queue.recovery_processing_stale_minutes * 60),
            now,
        )
    }

    /// Rewrite `running_tasks.json` as empty — called once on orderly
    /// shutdown after every in-flight task has finished.
    pub fn clear_running_tasks(&self) -> std::io::Result<()> {
        self.running_tasks_file.clear()
    }

    /// Run one iteration of the scheduler loop. `accept_new_work` is set
    /// to `false` once the stop sentinel is observed: no new file is
    /// ingested and no new task is dispatched, but in-flight tasks are
    /// still reaped so the worker can shut down cleanly. Returns whether
    /// this tick did anything, so the caller can decide whether to sleep.
    ///
    /// The heartbeat file is rewritten at most once every
    /// `Queue.HeartbeatEverySeconds` (spec §4.1/§4.8), not on every tick —
    /// a fast `--PollSeconds` shouldn't thrash `.state/heartbeat.json`.
    pub async fn tick(&mut self, accept_new_work: bool) -> std::io::Result<bool> {
        let now = self.clock.now();
        let mut did_work = false;

        let _ = clear_stale_git_lock(
            &self.layout.repo,
            Duration::from_secs(self.policy.git.index_lock_stale_minutes * 60),
            now,
        );
        prune::prune_logs(&self.layout.logs_dir, self.policy.queue.log_keep_days);

        if accept_new_work {
            did_work |= ingest_one(&mut self.state, &self.layout, &self.policy, &self.breaker, &self.ledger, now)?;
        }

        did_work |= self.fail_blocked_dependencies(now)?;

        if accept_new_work {
            let capacity = self.policy.queue.max_concurrent_tasks as usize;
            for id in select_ready(&self.state, now, capacity) {
                self.dispatch_one(id, now).await?;
                did_work = true;
            }
        }

        while let Ok(completion) = self.completions_rx.try_recv() {
            record_result(&mut self.state, &self.layout, &self.policy, &mut self.breaker, self.clock.now(), completion)?;
            did_work = true;
        }

        let due = match self.last_heartbeat_at {
            Some(last) => {
                now.signed_duration_since(last)
                    >= chrono::Duration::seconds(self.policy.queue.heartbeat_every_seconds as i64)
            }
            None => true,
        };
        if due {
            Heartbeat::write(
                self.layout.heartbeat_path().as_path(),
                self.state.running_count() as u32,
                self.policy.queue.max_concurrent_tasks,
                now,
            )?;
            self.last_heartbeat_at = Some(now);
        }
        self.write_running_tasks_snapshot()?;

        Ok(did_work)
    }

    fn fail_blocked_dependencies(&mut self, now: DateTime<Utc>) -> std::io::Result<bool> {
        let blocked = blocked_by_failed_dependency(&self.state);
        let mut did_work = false;
        for id in blocked {
            let Some(entry) = self.state.pending.get(&id) else { continue };
            let task = entry.task.clone();
            let source_file = entry.source_file.clone();

            let _ = self.ledger.append(&LedgerRecord {
                ts: now,
                id: task.id.as_str().to_string(),
                tool: task.tool.clone(),
                attempt: 0,
                exit: 409,
                ok: false,
                repo: task.repo.display().to_string(),
                duration_ms: None,
                note: Some("dependency failed".to_string()),
            });
            record_result(
                &mut self.state,
                &self.layout,
                &self.policy,
                &mut self.breaker,
                now,
                Disposition {
                    task,
                    source_file,
                    success: false,
                    exit: 409,
                    reason: Some("dependency failed".to_string()),
                },
            )?;
            did_work = true;
        }
        Ok(did_work)
    }

    async fn dispatch_one(&mut self, id: TaskId, now: DateTime<Utc>) -> std::io::Result<()> {
        let Some(entry) = self.state.pending.get(&id) else { return Ok(()) };
        let task = entry.task.clone();
        let source_file = entry.source_file.clone();

        // `select_ready` computed readiness against the lock table as it
        // stood at the start of the tick, so two pending entries for the
        // same tool can both appear in one tick's ready batch. Re-check
        // here, immediately before acquiring: whichever of them dispatches
        // first wins the lock, and this one is aborted without side
        // effects (spec §4.6 "Tool locks": "If acquire fails (race), the
        // dispatch is aborted"). It stays pending and is reconsidered next
        // tick once the lock is free.
        if self.state.tool_locks.contains_key(&task.tool) {
            return Ok(());
        }

        let prompt_file_path = match &task.prompt {
            Some(prompt) => {
                std::fs::create_dir_all(self.layout.prompts_dir())?;
                let path = self.layout.prompt_file(task.id.as_str());
                std::fs::write(&path, prompt)?;
                Some(path)
            }
            None => None,
        };
        let prompt_file_str = prompt_file_path.as_ref().and_then(|p| p.to_str());

        match self.resolver.resolve(&task, prompt_file_str).await {
            Err(e) => {
                let _ = self.ledger.append(&LedgerRecord {
                    ts: now,
                    id: task.id.as_str().to_string(),
                    tool: task.tool.clone(),
                    attempt: 0,
                    exit: 403,
                    ok: false,
                    repo: task.repo.display().to_string(),
                    duration_ms: None,
                    note: Some(e.to_string()),
                });
                record_result(
                    &mut self.state,
                    &self.layout,
                    &self.policy,
                    &mut self.breaker,
                    now,
                    Disposition { task, source_file, success: false, exit: 403, reason: Some(e.to_string()) },
                )?;
            }
            Ok(cmd) => {
                self.state.tool_locks.insert(task.tool.clone(), task.id.clone());
                self.state.running.insert(
                    task.id.clone(),
                    crate::state::RunningJob {
                        tool: task.tool.clone(),
                        repo: task.repo.clone(),
                        source_file: source_file.clone(),
                        priority: task.priority,
                        attempt: task.attempt + 1,
                        started: now,
                    },
                );
                self.state.pending.remove(&task.id);

                let spec = qr_runner::RunSpec {
                    executable: cmd.executable,
                    arguments: cmd.arguments,
                    cwd: task.repo.clone(),
                    log_path: self.layout.task_log(task.id.as_str()),
                    timeout: if task.timeout_sec > 0 {
                        Some(Duration::from_secs(task.timeout_sec))
                    } else {
                        None
                    },
                    max_retries: task.max_retries,
                    backoff_sec: task.backoff_sec,
                    backoff_max: task.backoff_max,
                    jitter_sec: task.jitter_sec,
                    starting_attempt: task.attempt,
                };

                let ledger = self.ledger.clone();
                let should_retry_policy = self.policy.clone();
                let tx = self.completions_tx.clone();
                let task_for_completion = task.clone();
                let source_file_for_completion = source_file.clone();
                let repo_str = task.repo.display().to_string();
                let tool = task.tool.clone();
                let id_str = task.id.as_str().to_string();

                tokio::spawn(async move {
                    let outcome = qr_runner::run_with_retries(
                        &spec,
                        move |exit| should_retry_policy.should_retry(exit),
                        |record| {
                            let _ = ledger.append(&LedgerRecord {
                                ts: record.started,
                                id: id_str.clone(),
                                tool: tool.clone(),
                                attempt: record.attempt,
                                exit: record.exit,
                                ok: record.exit == 0,
                                repo: repo_str.clone(),
                                duration_ms: Some(record.duration_ms),
                                note: if record.timed_out { Some("timed out".to_string()) } else { None },
                            });
                        },
                    )
                    .await;

                    let _ = tx.send(Disposition {
                        task: task_for_completion,
                        source_file: source_file_for_completion,
                        success: outcome.success,
                        exit: outcome.final_exit,
                        reason: None,
                    });
                });
            }
        }
        Ok(())
    }

    fn write_running_tasks_snapshot(&self) -> std::io::Result<()> {
        let entries: Vec<RunningTaskEntry> = self
            .state
            .running
            .iter()
            .map(|(id, job)| RunningTaskEntry {
                id: id.as_str().to_string(),
                tool: job.tool.clone(),
                repo: job.repo.display().to_string(),
                started: job.started,
                file: job.source_file.clone(),
                priority: job.priority,
                attempt: job.attempt,
            })
            .collect();
        self.running_tasks_file.write(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qr_core::FakeClock;

    fn scheduler(dir: &std::path::Path) -> Scheduler<FakeClock> {
        let layout = Layout::new(dir.to_path_buf(), dir.join(".tasks"), dir.join("logs"));
        Scheduler::new(layout, Policy::default(), FakeClock::new()).unwrap()
    }

    #[tokio::test]
    async fn idle_tick_does_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(dir.path());
        let did_work = scheduler.tick(true).await.unwrap();
        assert!(!did_work);
        assert!(!scheduler.has_in_flight());
    }

    #[tokio::test]
    async fn ingest_then_dispatch_runs_a_real_process() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf(), dir.path().join(".tasks"), dir.path().join("logs"));
        layout.ensure_dirs().unwrap();
        std::fs::write(
            layout.inbox().join("s1.jsonl"),
            r#"{"id":"t1","tool":"true","args":[],"max_retries":1}"#,
        )
        .unwrap();

        let mut scheduler = Scheduler::new(layout.clone(), Policy::default(), FakeClock::new()).unwrap();
        assert!(scheduler.tick(true).await.unwrap());
        assert!(scheduler.has_in_flight());

        // Poll a few ticks for the spawned process to complete and be reaped.
        for _ in 0..50 {
            if !scheduler.has_in_flight() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            scheduler.tick(true).await.unwrap();
        }
        assert!(!scheduler.has_in_flight());
        assert!(layout.done().join("s1.jsonl").exists());
    }

    #[tokio::test]
    async fn same_tool_tasks_never_run_concurrently_within_one_tick() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf(), dir.path().join(".tasks"), dir.path().join("logs"));
        layout.ensure_dirs().unwrap();
        std::fs::write(
            layout.inbox().join("s1.jsonl"),
            "{\"id\":\"t1\",\"tool\":\"true\",\"args\":[]}\n{\"id\":\"t2\",\"tool\":\"true\",\"args\":[]}\n",
        )
        .unwrap();

        let mut scheduler = Scheduler::new(layout.clone(), Policy::default(), FakeClock::new()).unwrap();
        // A single tick ingests the file (both lines become pending with
        // the `true` tool lock still free) and then dispatches: both
        // entries are equally ready, but only one may win the tool lock.
        scheduler.tick(true).await.unwrap();
        assert_eq!(scheduler.state.running.len(), 1);
        assert_eq!(scheduler.state.pending.len(), 1);
        assert_eq!(scheduler.state.tool_locks.len(), 1);

        for _ in 0..50 {
            if !scheduler.has_in_flight() && scheduler.state.pending.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            scheduler.tick(true).await.unwrap();
        }
        assert!(!scheduler.has_in_flight());
        assert!(scheduler.state.pending.is_empty());
        assert!(layout.done().join("s1.jsonl").exists());
    }

    #[tokio::test]
    async fn rollback_branch_create_is_rejected_as_403_without_running() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf(), dir.path().join(".tasks"), dir.path().join("logs"));
        layout.ensure_dirs().unwrap();
        std::fs::write(
            layout.inbox().join("s1.jsonl"),
            r#"{"id":"t1","tool":"git","args":["checkout","-b","rollback/x"]}"#,
        )
        .unwrap();

        let mut scheduler = Scheduler::new(layout.clone(), Policy::default(), FakeClock::new()).unwrap();
        scheduler.tick(true).await.unwrap();
        scheduler.tick(true).await.unwrap();

        assert!(!scheduler.has_in_flight());
        assert!(layout.failed().join("s1.jsonl").exists());
        let ledger = std::fs::read_to_string(layout.ledger_path()).unwrap();
        assert!(ledger.contains("\"exit\":403"));
    }
}
