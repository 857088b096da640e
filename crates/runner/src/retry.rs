// SPDX-License-Identifier: MIT

//! The retry loop described in spec §4.4: launch, decide retry from the
//! exit code and attempt count, sleep an exponential backoff with jitter,
//! loop. Each attempt is reported to the caller via `on_attempt` as soon
//! as it completes so the ledger record order matches attempt order.

use crate::log::append_attempt_header;
use crate::path::locate_executable;
use crate::process::launch_and_wait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Everything the runner needs for one task's worth of attempts.
pub struct RunSpec {
    pub executable: String,
    pub arguments: Vec<String>,
    pub cwd: PathBuf,
    pub log_path: PathBuf,
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub backoff_sec: u64,
    pub backoff_max: u64,
    pub jitter_sec: u64,
    /// Attempts already recorded for this task before this call (0 for a
    /// fresh task); the next attempt is numbered `starting_attempt + 1`.
    pub starting_attempt: u32,
}

/// One completed attempt, ready to become a ledger record.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub exit: i32,
    pub timed_out: bool,
    pub started: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Final disposition of a task after its retry loop ends.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub final_exit: i32,
    pub attempts: Vec<AttemptRecord>,
    pub started: DateTime<Utc>,
    pub ended: DateTime<Utc>,
}

/// Run `spec` to completion, calling `should_retry(exit_code)` to decide
/// whether a non-zero, non-special exit is eligible for another attempt,
/// and `on_attempt` after every attempt (success or failure) so the
/// caller can append a ledger record immediately.
pub async fn run_with_retries(
    spec: &RunSpec,
    should_retry: impl Fn(i32) -> bool,
    mut on_attempt: impl FnMut(&AttemptRecord),
) -> RunOutcome {
    let run_started = Utc::now();
    let mut attempts = Vec::new();

    if locate_executable(&spec.executable).is_none() {
        let now = Utc::now();
        let _ = append_attempt_header(&spec.log_path, spec.starting_attempt + 1, now);
        let _ = crate::log::append_line(
            &spec.log_path,
            &format!("executable '{}' not found on PATH", spec.executable),
        );
        let record = AttemptRecord {
            attempt: spec.starting_attempt + 1,
            exit: 127,
            timed_out: false,
            started: now,
            duration_ms: 0,
        };
        on_attempt(&record);
        attempts.push(record);
        return RunOutcome {
            success: false,
            final_exit: 127,
            attempts,
            started: run_started,
            ended: Utc::now(),
        };
    }

    let mut attempt_count = spec.starting_attempt;
    loop {
        attempt_count += 1;
        let started = Utc::now();
        let _ = append_attempt_header(&spec.log_path, attempt_count, started);
        let clock = Instant::now();

        let (exit, timed_out) = match launch_and_wait(
            &spec.executable,
            &spec.arguments,
            &spec.cwd,
            &spec.log_path,
            spec.timeout,
        )
        .await
        {
            Ok(out) => (out.exit, out.timed_out),
            Err(e) => {
                let _ = crate::log::append_line(&spec.log_path, &format!("launch failed: {e}"));
                (127, false)
            }
        };
        let duration_ms = clock.elapsed().as_millis() as u64;

        let record = AttemptRecord { attempt: attempt_count, exit, timed_out, started, duration_ms };
        on_attempt(&record);
        attempts.push(record);

        if exit == 0 {
            return RunOutcome {
                success: true,
                final_exit: 0,
                attempts,
                started: run_started,
                ended: Utc::now(),
            };
        }

        let can_retry = exit != 127 && attempt_count < spec.max_retries && should_retry(exit);
        if !can_retry {
            return RunOutcome {
                success: false,
                final_exit: exit,
                attempts,
                started: run_started,
                ended: Utc::now(),
            };
        }

        let backoff = backoff_duration(spec.backoff_sec, spec.backoff_max, spec.jitter_sec, attempt_count);
        tokio::time::sleep(backoff).await;
    }
}

/// `min(backoff_max, backoff_sec * 2^(attempt-1)) + uniformRandom[0, jitter)`.
fn backoff_duration(backoff_sec: u64, backoff_max: u64, jitter_sec: u64, attempt: u32) -> Duration {
    let exp = backoff_sec.saturating_mul(1u64 << attempt.saturating_sub(1).min(62));
    let base = exp.min(backoff_max);
    let jitter = if jitter_sec > 0 { rand::thread_rng().gen_range(0..jitter_sec) } else { 0 };
    Duration::from_secs(base + jitter)
}
