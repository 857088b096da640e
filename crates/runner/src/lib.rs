// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! qr-runner: the Process Runner (spec §4.4) — launches a resolved
//! command, captures stdout/stderr to the per-task log, enforces a
//! timeout by killing the whole process group, and retries with
//! exponential backoff plus jitter.

pub mod error;
pub mod log;
pub mod path;
pub mod process;
pub mod retry;

pub use error::RunnerError;
pub use retry::{run_with_retries, AttemptRecord, RunOutcome, RunSpec};
