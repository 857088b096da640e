// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolver rejected the task outright (e.g. the rollback/ safety
    /// check). Maps to ledger/result exit code 403; never dispatched.
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("io error reading plugin manifest {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),
    #[error("malformed plugin manifest {0}: {1}")]
    Parse(std::path::PathBuf, toml::de::Error),
}

#[derive(Debug, Error)]
pub enum PluginResolveError {
    #[error("failed to launch plugin executable {0}: {1}")]
    Spawn(std::path::PathBuf, std::io::Error),
    #[error("plugin exited with status {0}")]
    NonZeroExit(i32),
    #[error("plugin produced malformed JSON response: {0}")]
    BadResponse(serde_json::Error),
    #[error("io error talking to plugin: {0}")]
    Io(#[from] std::io::Error),
}
