// SPDX-License-Identifier: MIT

//! Per-tool circuit breaker state, persisted as JSON after every transition.

use crate::atomic::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
}

qr_core::simple_display! {
    BreakerState {
        Closed => "closed",
        Open => "open",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolBreaker {
    pub fails: u32,
    pub state: BreakerState,
    pub until: Option<DateTime<Utc>>,
}

impl Default for ToolBreaker {
    fn default() -> Self {
        Self { fails: 0, state: BreakerState::Closed, until: None }
    }
}

/// Persisted `{tool_name -> ToolBreaker}` table, written atomically after
/// every state transition.
#[derive(Debug, Default)]
pub struct BreakerStore {
    path: PathBuf,
    state: BTreeMap<String, ToolBreaker>,
}

impl BreakerStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self { path, state }
    }

    fn persist(&self) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.state).unwrap_or_default();
        write_atomic(&self.path, &bytes)
    }

    /// `state == open && now < until` — the only condition that diverts
    /// ingestion to `quarantine/`.
    pub fn is_open(&self, tool: &str, now: DateTime<Utc>) -> bool {
        match self.state.get(tool) {
            Some(b) => b.state == BreakerState::Open && b.until.is_some_and(|u| now < u),
            None => false,
        }
    }

    /// Success: `fails = 0`, `state = closed`. This is the only path back
    /// to closed — there is no automatic half-open probe.
    pub fn record_success(&mut self, tool: &str) -> std::io::Result<()> {
        self.state.insert(tool.to_string(), ToolBreaker::default());
        self.persist()
    }

    /// Failure: `fails += 1`; opens once `fails >= window_failures`.
    pub fn record_failure(
        &mut self,
        tool: &str,
        window_failures: u32,
        open_seconds: u64,
        now: DateTime<Utc>,
    ) -> std::io::Result<()> {
        let entry = self.state.entry(tool.to_string()).or_default();
        entry.fails += 1;
        if entry.fails >= window_failures {
            entry.state = BreakerState::Open;
            entry.until = Some(now + chrono::Duration::seconds(open_seconds as i64));
        }
        self.persist()
    }
}

pub fn default_breaker_path(state_dir: &Path) -> PathBuf {
    state_dir.join("circuit_breakers.json")
}
