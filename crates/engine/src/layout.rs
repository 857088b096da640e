// SPDX-License-Identifier: MIT

//! Filesystem layout rooted at the configured repo (spec §6).

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Layout {
    pub repo: PathBuf,
    pub tasks_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub state_dir: PathBuf,
    pub plugins_dir: PathBuf,
}

impl Layout {
    pub fn new(repo: PathBuf, tasks_dir: PathBuf, logs_dir: PathBuf) -> Self {
        let state_dir = repo.join(".state");
        let plugins_dir = repo.join("plugins");
        Self { repo, tasks_dir, logs_dir, state_dir, plugins_dir }
    }

    pub fn inbox(&self) -> PathBuf {
        self.tasks_dir.join("inbox")
    }

    pub fn processing(&self) -> PathBuf {
        self.tasks_dir.join("processing")
    }

    pub fn done(&self) -> PathBuf {
        self.tasks_dir.join("done")
    }

    pub fn failed(&self) -> PathBuf {
        self.tasks_dir.join("failed")
    }

    pub fn quarantine(&self) -> PathBuf {
        self.tasks_dir.join("quarantine")
    }

    pub fn stop_sentinel(&self) -> PathBuf {
        self.repo.join("STOP.HEADLESS")
    }

    pub fn task_log(&self, id: &str) -> PathBuf {
        self.logs_dir.join(format!("task_{id}.log"))
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.logs_dir.join("prompts")
    }

    pub fn prompt_file(&self, id: &str) -> PathBuf {
        self.prompts_dir().join(format!("prompt_{id}.txt"))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.logs_dir.join("ledger.jsonl")
    }

    pub fn worker_log_path(&self) -> PathBuf {
        self.logs_dir.join("queueworker.log")
    }

    pub fn heartbeat_path(&self) -> PathBuf {
        qr_storage::heartbeat::default_heartbeat_path(&self.state_dir)
    }

    pub fn breaker_path(&self) -> PathBuf {
        qr_storage::breaker::default_breaker_path(&self.state_dir)
    }

    pub fn running_tasks_path(&self) -> PathBuf {
        qr_storage::running_tasks::default_running_tasks_path(&self.state_dir)
    }

    /// Create every directory this layout names. Called once at startup;
    /// the scheduler otherwise assumes these exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.inbox(),
            self.processing(),
            self.done(),
            self.failed(),
            self.quarantine(),
            self.logs_dir.clone(),
            self.prompts_dir(),
            self.state_dir.clone(),
            self.plugins_dir.clone(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_under_repo() {
        let layout = Layout::new(
            PathBuf::from("/repo"),
            PathBuf::from("/repo/.tasks"),
            PathBuf::from("/repo/logs"),
        );
        assert_eq!(layout.inbox(), PathBuf::from("/repo/.tasks/inbox"));
        assert_eq!(layout.stop_sentinel(), PathBuf::from("/repo/STOP.HEADLESS"));
        assert_eq!(layout.task_log("abc123"), PathBuf::from("/repo/logs/task_abc123.log"));
        assert_eq!(layout.state_dir, PathBuf::from("/repo/.state"));
    }
}
