// SPDX-License-Identifier: MIT

//! `qr-supervisor` — spec §4.9: spawns the worker and restarts it whenever
//! its process exits or its heartbeat goes stale. Itself has no persistent
//! state; it is expected to be invoked by an OS-level service/scheduler at
//! boot or login.

use clap::Parser;
use chrono::Utc;
use qr_storage::Heartbeat;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;
use tracing::{error, info, warn};

/// Restarts the queue worker whenever it exits or its heartbeat goes stale.
#[derive(Parser, Debug)]
#[command(name = "qr-supervisor", version)]
struct Cli {
    /// Path to the worker binary to spawn.
    #[arg(long = "Worker")]
    worker: PathBuf,

    /// How stale (seconds) the worker's heartbeat may get before it is
    /// considered hung and restarted.
    #[arg(long = "HeartbeatStaleSec", default_value_t = 20)]
    heartbeat_stale_sec: u64,

    /// Repository root, used only to locate `.state/heartbeat.json` —
    /// forwarded to the worker as `--Repo` so both agree on it.
    #[arg(long = "Repo", default_value = ".")]
    repo: PathBuf,

    /// How often to check the worker's liveness.
    #[arg(long = "CheckSeconds", default_value_t = 5)]
    check_seconds: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let heartbeat_path = cli.repo.join(".state").join("heartbeat.json");
    let stale_after = Duration::from_secs(cli.heartbeat_stale_sec);
    let check_interval = Duration::from_secs(cli.check_seconds);

    let mut child = spawn_worker(&cli.worker, &cli.repo);

    loop {
        tokio::time::sleep(check_interval).await;

        let alive = match &mut child {
            Some(c) => matches!(c.try_wait(), Ok(None)),
            None => false,
        };
        let heartbeat_fresh = alive && is_heartbeat_fresh(&heartbeat_path, stale_after);

        if alive && heartbeat_fresh {
            continue;
        }

        if alive {
            warn!("worker heartbeat stale, restarting");
        } else {
            warn!("worker process exited, restarting");
        }
        kill_if_alive(&mut child);
        child = spawn_worker(&cli.worker, &cli.repo);
    }
}

fn spawn_worker(worker_path: &std::path::Path, repo: &std::path::Path) -> Option<Child> {
    match Command::new(worker_path).arg("--Repo").arg(repo).spawn() {
        Ok(child) => {
            info!(pid = child.id(), worker = %worker_path.display(), "spawned worker");
            Some(child)
        }
        Err(e) => {
            error!(error = %e, worker = %worker_path.display(), "failed to spawn worker");
            None
        }
    }
}

fn is_heartbeat_fresh(path: &std::path::Path, stale_after: Duration) -> bool {
    match Heartbeat::read(path) {
        Ok(hb) => hb.is_fresh(Utc::now(), stale_after),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn kill_if_alive(child: &mut Option<Child>) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    if let Some(c) = child.take() {
        let _ = kill(Pid::from_raw(c.id() as i32), Signal::SIGTERM);
        let mut c = c;
        let _ = c.wait();
    }
}

#[cfg(not(unix))]
fn kill_if_alive(child: &mut Option<Child>) {
    if let Some(mut c) = child.take() {
        let _ = c.kill();
        let _ = c.wait();
    }
}
