// SPDX-License-Identifier: MIT

//! Shared scaffolding for the filesystem-lifecycle integration tests
//! (spec.md §8 "Concrete scenarios"): builds a fresh `.tasks`/`logs`/
//! `.state` tree under a tempdir, drives the real `queueworker` binary
//! against it, and polls for the file-move outcomes the scenarios
//! describe instead of sleeping a fixed amount.

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

/// Locate (building if necessary) the `queueworker` binary from the
/// `qr-worker` crate. Workspace binaries aren't visible to the root
/// package's `CARGO_BIN_EXE_*` env vars, so this shells out to `escargot`
/// against that crate's manifest, matching the documented workaround for
/// cross-package integration tests under `assert_cmd`.
pub fn queueworker_cmd() -> Command {
    let manifest = workspace_root().join("crates/worker/Cargo.toml");
    escargot::CargoBuild::new()
        .manifest_path(manifest)
        .bin("queueworker")
        .run()
        .expect("failed to build queueworker for integration tests")
        .command()
}

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// A scratch repo with every `.tasks/*`, `logs/`, and `.state/` directory
/// spec §6 names, plus a `policy.toml` the caller can tune per scenario.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        for sub in ["inbox", "processing", "done", "failed", "quarantine"] {
            std::fs::create_dir_all(dir.path().join(".tasks").join(sub)).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_policy(&self, toml: &str) {
        std::fs::write(self.path().join("policy.toml"), toml).unwrap();
    }

    pub fn drop_inbox_file(&self, name: &str, contents: &str) {
        std::fs::write(self.path().join(".tasks/inbox").join(name), contents).unwrap();
    }

    pub fn ledger_contents(&self) -> String {
        std::fs::read_to_string(self.path().join("logs/ledger.jsonl")).unwrap_or_default()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path().join(relative).exists()
    }

    /// Spawn `queueworker --Repo <self> --PollSeconds 1` and return a
    /// handle that kills the child on drop if the test forgets to stop it.
    pub fn spawn_worker(&self) -> WorkerHandle {
        let child = queueworker_cmd()
            .arg("--Repo")
            .arg(self.path())
            .arg("--PollSeconds")
            .arg("1")
            .spawn()
            .expect("spawn queueworker");
        WorkerHandle { child: Some(child) }
    }
}

pub struct WorkerHandle {
    child: Option<Child>,
}

impl WorkerHandle {
    /// Write the `STOP.HEADLESS` sentinel and wait (with a generous
    /// timeout) for the worker to exit on its own.
    pub fn stop(&mut self, repo: &Path, timeout: Duration) {
        std::fs::write(repo.join("STOP.HEADLESS"), "").unwrap();
        if let Some(child) = self.child.as_mut() {
            wait_for(timeout, || matches!(child.try_wait(), Ok(Some(_))));
            let _ = child.kill();
            let _ = child.wait();
        }
        self.child = None;
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Poll `predicate` every 50ms until it returns true or `timeout` elapses.
/// Returns whether it became true — callers assert on the return value so
/// a timeout reads as a normal, readable test failure.
pub fn wait_for(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    loop {
        if predicate() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

pub fn default_policy() -> &'static str {
    r#"
    [queue]
    max_concurrent_tasks = 4

    [retry]
    default_max_retries = 0
    backoff_start_seconds = 0
    backoff_max_seconds = 0
    jitter_seconds = 0
    retry_on_exit_codes = [1, 2, 998]

    [circuit_breaker]
    window_failures = 3
    open_seconds = 300
    "#
}
