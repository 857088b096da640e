// SPDX-License-Identifier: MIT

//! Single-attempt process launch: spawn in its own process group, drain
//! stdout/stderr concurrently into the per-task log, enforce an optional
//! timeout by killing the whole group.

use crate::error::RunnerError;
use crate::log::append_line;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::warn;

/// Outcome of one launched attempt.
pub struct AttemptOutput {
    pub exit: i32,
    pub timed_out: bool,
}

/// Launch `executable arguments` in `cwd`, draining both stdout and
/// stderr into `log_path` prefixed `[out]`/`[err]`, and enforce `timeout`
/// (if set) by killing the process group.
pub async fn launch_and_wait(
    executable: &str,
    arguments: &[String],
    cwd: &Path,
    log_path: &Path,
    timeout: Option<Duration>,
) -> Result<AttemptOutput, RunnerError> {
    let mut cmd = Command::new(executable);
    cmd.args(arguments)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New process group so a timeout kill reaches the whole tree, not
        // just the direct child.
        cmd.process_group(0);
    }

    let mut child = cmd.spawn()?;
    let pid = child.id();
    let stdout = child.stdout.take().ok_or(RunnerError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(RunnerError::MissingPipe("stderr"))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let out_task = tokio::spawn(drain_stream(stdout, "out", tx.clone()));
    let err_task = tokio::spawn(drain_stream(stderr, "err", tx));

    let log_path_owned: PathBuf = log_path.to_path_buf();
    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = append_line(&log_path_owned, &line) {
                warn!(error = %e, "failed to append to per-task log");
            }
        }
    });

    let (exit, timed_out) = match timeout {
        Some(limit) => {
            tokio::select! {
                status = child.wait() => (exit_code(status?), false),
                _ = tokio::time::sleep(limit) => {
                    kill_process_tree(pid);
                    let _ = child.wait().await;
                    (998, true)
                }
            }
        }
        None => (exit_code(child.wait().await?), false),
    };

    let _ = out_task.await;
    let _ = err_task.await;
    let _ = writer_task.await;

    Ok(AttemptOutput { exit, timed_out })
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(unix)]
fn kill_process_tree(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    if let Some(pid) = pid {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_tree(_pid: Option<u32>) {}

async fn drain_stream(
    stream: impl tokio::io::AsyncRead + Unpin,
    prefix: &'static str,
    tx: mpsc::UnboundedSender<String>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(format!("[{prefix}] {line}")).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, stream = prefix, "error reading child output");
                break;
            }
        }
    }
}
