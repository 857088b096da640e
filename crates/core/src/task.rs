// SPDX-License-Identifier: MIT

//! Task record and the validator that canonicalizes a decoded task line.

use crate::id::TaskId;
use crate::priority::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// A task exactly as decoded from one line of an inbox `*.jsonl` file.
///
/// Every field but `tool` is optional; [`validate`] fills the rest from
/// policy defaults. This mirrors the source's dynamically-typed hashtable
/// with `??` defaulting, reimplemented as defaulting at a single boundary
/// rather than scattered through the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<String>,
    pub tool: String,
    #[serde(default)]
    pub repo: Option<PathBuf>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub backoff_sec: Option<u64>,
    #[serde(default)]
    pub backoff_max: Option<u64>,
    #[serde(default)]
    pub jitter_sec: Option<u64>,
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    #[serde(default)]
    pub run_at: Option<String>,
    #[serde(default)]
    pub recurring_minutes: Option<u64>,
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

/// Policy-sourced defaults the validator falls back to when a task omits
/// the corresponding field.
#[derive(Debug, Clone, Copy)]
pub struct RetryDefaults {
    pub max_retries: u32,
    pub backoff_sec: u64,
    pub backoff_max: u64,
    pub jitter_sec: u64,
}

/// A canonicalized, fully-defaulted task ready for scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedTask {
    pub id: TaskId,
    pub tool: String,
    pub repo: PathBuf,
    pub priority: Priority,
    pub args: Vec<String>,
    pub flags: Vec<String>,
    pub files: Vec<String>,
    pub prompt: Option<String>,
    pub max_retries: u32,
    pub backoff_sec: u64,
    pub backoff_max: u64,
    pub jitter_sec: u64,
    #[serde(default)]
    pub attempt: u32,
    pub depends_on: BTreeSet<TaskId>,
    pub run_at: Option<DateTime<Utc>>,
    pub recurring_minutes: u64,
    pub timeout_sec: u64,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("missing required field: tool")]
    MissingTool,
    #[error("invalid run_at timestamp: {0}")]
    BadRunAt(String),
    #[error("task depends on itself")]
    SelfDependency,
}

impl ValidatedTask {
    /// Canonicalize a raw decoded task, filling defaults from policy.
    ///
    /// `default_repo` is the worker's configured repository, used when the
    /// task omits `repo`. Relative `files` entries are resolved against the
    /// final `repo` directory.
    pub fn validate(
        raw: Task,
        defaults: RetryDefaults,
        default_repo: &std::path::Path,
    ) -> Result<Self, TaskError> {
        if raw.tool.trim().is_empty() {
            return Err(TaskError::MissingTool);
        }
        let tool = raw.tool.trim().to_lowercase();

        let id = match raw.id.filter(|s| !s.trim().is_empty()) {
            Some(s) => TaskId::from(s),
            None => TaskId::generate(),
        };

        let repo = raw.repo.unwrap_or_else(|| default_repo.to_path_buf());

        let run_at = match raw.run_at.filter(|s| !s.trim().is_empty()) {
            Some(s) => {
                let parsed = DateTime::parse_from_rfc3339(&s)
                    .map_err(|_| TaskError::BadRunAt(s.clone()))?;
                Some(parsed.with_timezone(&Utc))
            }
            None => None,
        };

        let depends_on: BTreeSet<TaskId> = raw
            .depends_on
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(TaskId::from)
            .collect();
        if depends_on.contains(id.as_str()) {
            return Err(TaskError::SelfDependency);
        }

        let files = raw
            .files
            .into_iter()
            .map(|f| {
                let p = PathBuf::from(&f);
                if p.is_relative() {
                    repo.join(p).to_string_lossy().into_owned()
                } else {
                    f
                }
            })
            .collect();

        Ok(ValidatedTask {
            id,
            tool,
            repo,
            priority: raw.priority.unwrap_or_default(),
            args: raw.args,
            flags: raw.flags,
            files,
            prompt: raw.prompt,
            max_retries: raw.max_retries.unwrap_or(defaults.max_retries),
            backoff_sec: raw.backoff_sec.unwrap_or(defaults.backoff_sec),
            backoff_max: raw.backoff_max.unwrap_or(defaults.backoff_max),
            jitter_sec: raw.jitter_sec.unwrap_or(defaults.jitter_sec),
            attempt: 0,
            depends_on,
            run_at,
            recurring_minutes: raw.recurring_minutes.unwrap_or(0),
            timeout_sec: raw.timeout_sec.unwrap_or(0),
        })
    }

    /// Clone this task as a recurring re-enqueue: fresh id suffix, no
    /// dependencies, reset attempt count, `run_at` pushed out by
    /// `recurring_minutes`. Per spec, recurring copies never inherit
    /// dependencies.
    pub fn as_recurring_clone(&self, now: DateTime<Utc>, id_suffix: &str) -> ValidatedTask {
        ValidatedTask {
            id: self.id.recurring_clone(id_suffix),
            attempt: 0,
            depends_on: BTreeSet::new(),
            run_at: Some(now + chrono::Duration::minutes(self.recurring_minutes as i64)),
            ..self.clone()
        }
    }

    /// Serialize this task back to the raw inbox-line shape, used when
    /// writing a recurring re-enqueue file into `inbox/`. The round trip
    /// through [`validate`] on next ingest is intentional: a recurring
    /// copy is a fresh line, not a resumed in-memory task.
    pub fn to_raw_task(&self) -> Task {
        Task {
            id: Some(self.id.as_str().to_string()),
            tool: self.tool.clone(),
            repo: Some(self.repo.clone()),
            priority: Some(self.priority),
            args: self.args.clone(),
            flags: self.flags.clone(),
            files: self.files.clone(),
            prompt: self.prompt.clone(),
            max_retries: Some(self.max_retries),
            backoff_sec: Some(self.backoff_sec),
            backoff_max: Some(self.backoff_max),
            jitter_sec: Some(self.jitter_sec),
            depends_on: self.depends_on.iter().map(|id| id.as_str().to_string()).collect(),
            run_at: self.run_at.map(|t| t.to_rfc3339()),
            recurring_minutes: Some(self.recurring_minutes),
            timeout_sec: Some(self.timeout_sec),
        }
    }
}
