// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! qr-policy: immutable configuration loaded once at worker startup.

use qr_core::task::RetryDefaults;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy file not found: {0}")]
    NotFound(std::path::PathBuf),
    #[error("could not read policy file {0}: {1}")]
    Read(std::path::PathBuf, std::io::Error),
    #[error("malformed policy file {0}: {1}")]
    Parse(std::path::PathBuf, toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub max_concurrent_tasks: u32,
    pub recovery_processing_stale_minutes: u64,
    pub heartbeat_every_seconds: u64,
    pub log_rotate_max_mb: u64,
    pub log_keep_days: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            recovery_processing_stale_minutes: 10,
            heartbeat_every_seconds: 5,
            log_rotate_max_mb: 50,
            log_keep_days: 14,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub default_max_retries: u32,
    pub backoff_start_seconds: u64,
    pub backoff_max_seconds: u64,
    pub jitter_seconds: u64,
    pub retry_on_exit_codes: BTreeSet<i32>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            default_max_retries: 2,
            backoff_start_seconds: 5,
            backoff_max_seconds: 120,
            jitter_seconds: 3,
            retry_on_exit_codes: [1, 2, 998].into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSection {
    pub window_failures: u32,
    pub open_seconds: u64,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        Self { window_failures: 3, open_seconds: 300 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitSection {
    pub index_lock_stale_minutes: u64,
    pub auto_gc: bool,
    pub gc_every_minutes: u64,
}

impl Default for GitSection {
    fn default() -> Self {
        Self { index_lock_stale_minutes: 15, auto_gc: false, gc_every_minutes: 60 }
    }
}

/// Immutable worker configuration, loaded once from a TOML file.
///
/// Mirrors the source's `Queue.*` / `Retry.*` / `CircuitBreaker.*` / `Git.*`
/// dotted-key sections as typed TOML tables.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Policy {
    pub queue: QueueSection,
    pub retry: RetrySection,
    pub circuit_breaker: CircuitBreakerSection,
    pub git: GitSection,
    /// Free-form label stamped into log lines for multi-worker deployments.
    /// Ambient, does not affect scheduling semantics.
    pub worker_id: Option<String>,
}

impl Policy {
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        if !path.exists() {
            return Err(PolicyError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PolicyError::Read(path.to_path_buf(), e))?;
        toml::from_str(&raw).map_err(|e| PolicyError::Parse(path.to_path_buf(), e))
    }

    pub fn retry_defaults(&self) -> RetryDefaults {
        RetryDefaults {
            max_retries: self.retry.default_max_retries,
            backoff_sec: self.retry.backoff_start_seconds,
            backoff_max: self.retry.backoff_max_seconds,
            jitter_sec: self.retry.jitter_seconds,
        }
    }

    pub fn should_retry(&self, exit_code: i32) -> bool {
        self.retry.retry_on_exit_codes.contains(&exit_code)
    }
}
