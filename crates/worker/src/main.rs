// SPDX-License-Identifier: MIT

//! `queueworker` — the worker binary (spec §6 CLI surface, §4.6 main loop).
//!
//! Owns CLI parsing, logging setup, and the poll/sleep/signal wiring
//! around [`qr_engine::Scheduler`]. The scheduler itself owns every piece
//! of durable and in-memory state; this binary only decides when to call
//! it and when to stop calling it.

use clap::Parser;
use qr_core::SystemClock;
use qr_engine::{Layout, Scheduler};
use qr_policy::Policy;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Headless job-queue worker.
#[derive(Parser, Debug)]
#[command(name = "queueworker", version)]
struct Cli {
    /// Repository root the worker operates against.
    #[arg(long = "Repo", default_value = ".")]
    repo: PathBuf,

    /// Inbox/processing/done/failed/quarantine root. Defaults to `<repo>/.tasks`.
    #[arg(long = "TasksDir")]
    tasks_dir: Option<PathBuf>,

    /// Ledger, per-task logs, and rotated archives root. Defaults to `<repo>/logs`.
    #[arg(long = "LogsDir")]
    logs_dir: Option<PathBuf>,

    /// Seconds to sleep between loop ticks when idle.
    #[arg(long = "PollSeconds", default_value_t = 3)]
    poll_seconds: u64,

    /// Policy TOML file. Defaults to `<repo>/policy.toml`.
    #[arg(long = "PolicyFile")]
    policy_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let repo = match cli.repo.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: repo '{}' does not exist: {e}", cli.repo.display());
            std::process::exit(1);
        }
    };
    let tasks_dir = cli.tasks_dir.unwrap_or_else(|| repo.join(".tasks"));
    let logs_dir = cli.logs_dir.unwrap_or_else(|| repo.join("logs"));
    let policy_file = cli.policy_file.unwrap_or_else(|| repo.join("policy.toml"));

    let _log_guard = match setup_logging(&logs_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: could not set up logging in {}: {e}", logs_dir.display());
            std::process::exit(1);
        }
    };

    let policy = match Policy::load(&policy_file) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "fatal: could not load policy");
            std::process::exit(1);
        }
    };

    let layout = Layout::new(repo, tasks_dir, logs_dir);
    let mut scheduler = match Scheduler::new(layout, policy, SystemClock) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "fatal: could not initialize state directories");
            std::process::exit(1);
        }
    };

    if let Err(e) = scheduler.self_heal_startup() {
        error!(error = %e, "self-heal on startup failed, continuing");
    }

    info!("queueworker starting");
    run_until_stopped(&mut scheduler, Duration::from_secs(cli.poll_seconds)).await;
    info!("queueworker shut down cleanly");
}

/// The loop in spec §4.6: tick repeatedly, sleeping only when a tick did
/// no work. Once the stop sentinel (or a termination signal) is observed,
/// keep ticking with `accept_new_work = false` — in-flight tasks finish,
/// but nothing new is ingested or dispatched — until nothing is running,
/// then clear the running-tasks snapshot and return.
async fn run_until_stopped(scheduler: &mut Scheduler<SystemClock>, poll: Duration) {
    let mut shutting_down = false;
    loop {
        if !shutting_down && (scheduler.stop_sentinel_present() || termination_requested()) {
            info!("stop requested, finishing in-flight tasks before exit");
            shutting_down = true;
        }

        let did_work = match scheduler.tick(!shutting_down).await {
            Ok(did_work) => did_work,
            Err(e) => {
                error!(error = %e, "error during scheduler tick, continuing");
                true
            }
        };

        if shutting_down && !scheduler.has_in_flight() {
            break;
        }

        if !did_work {
            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = tokio::signal::ctrl_c() => {
                    shutting_down = true;
                }
            }
        }
    }

    if let Err(e) = scheduler.clear_running_tasks() {
        error!(error = %e, "failed to clear running-tasks snapshot on shutdown");
    }
}

/// Non-blocking check for a delivered `SIGTERM`/`SIGINT`, treated the same
/// as the `STOP.HEADLESS` sentinel file: orderly shutdown after in-flight
/// tasks complete.
fn termination_requested() -> bool {
    static REQUESTED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);
    #[cfg(unix)]
    {
        use std::sync::Once;
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            tokio::spawn(async {
                use tokio::signal::unix::{signal, SignalKind};
                let Ok(mut term) = signal(SignalKind::terminate()) else { return };
                term.recv().await;
                REQUESTED.store(true, std::sync::atomic::Ordering::SeqCst);
            });
        });
    }
    REQUESTED.load(std::sync::atomic::Ordering::SeqCst)
}

fn setup_logging(
    logs_dir: &std::path::Path,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(logs_dir)?;
    let file_appender = tracing_appender::rolling::never(logs_dir, "queueworker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
