// SPDX-License-Identifier: MIT

//! Plugin contract: a TOML manifest under `plugins/*.toml` pointing at an
//! out-of-process executable that speaks a one-shot JSON protocol over
//! stdio. This replaces the source's "execute arbitrary plugin source
//! files" contract with a typed, sandboxable subprocess call, per the
//! REDESIGN FLAGS in the spec.

use crate::builtin::ResolvedCommand;
use crate::error::{PluginLoadError, PluginResolveError};
use qr_core::task::ValidatedTask;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub tool: String,
    #[serde(default)]
    pub description: Option<String>,
    pub command: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Plugin {
    pub manifest: PluginManifest,
    manifest_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct PluginRequest<'a> {
    task: &'a ValidatedTask,
    prompt_file: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PluginResponse {
    executable: String,
    arguments: Vec<String>,
}

impl Plugin {
    /// Resolve `command` against the manifest's own directory when it is a
    /// relative path, so a plugin can ship its helper binary alongside the
    /// manifest.
    fn command_path(&self) -> PathBuf {
        if self.manifest.command.is_absolute() {
            self.manifest.command.clone()
        } else {
            self.manifest_dir.join(&self.manifest.command)
        }
    }

    pub async fn resolve_command(
        &self,
        task: &ValidatedTask,
        prompt_file: Option<&str>,
    ) -> Result<ResolvedCommand, PluginResolveError> {
        let command_path = self.command_path();
        let mut child = Command::new(&command_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PluginResolveError::Spawn(command_path.clone(), e))?;

        let request = PluginRequest { task, prompt_file };
        let payload = serde_json::to_vec(&request).unwrap_or_default();

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
        }
        // Close stdin by dropping the handle, then read the full response.
        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout).await?;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(PluginResolveError::NonZeroExit(status.code().unwrap_or(-1)));
        }

        let response: PluginResponse =
            serde_json::from_str(stdout.trim()).map_err(PluginResolveError::BadResponse)?;
        Ok(ResolvedCommand { executable: response.executable, arguments: response.arguments })
    }
}

/// Scan `plugins_dir` for `*.toml` manifests. Load failures (malformed
/// TOML, missing fields) are returned alongside successfully loaded
/// plugins rather than aborting the scan — the caller logs and continues,
/// per spec §4.3 ("Plugin load failures are logged but do not abort
/// startup").
pub fn scan_plugins(plugins_dir: &Path) -> (Vec<Plugin>, Vec<PluginLoadError>) {
    let mut plugins = Vec::new();
    let mut errors = Vec::new();

    let Ok(entries) = std::fs::read_dir(plugins_dir) else {
        return (plugins, errors);
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        match load_manifest(&path) {
            Ok(manifest) => {
                let manifest_dir = path.parent().unwrap_or(plugins_dir).to_path_buf();
                plugins.push(Plugin { manifest, manifest_dir });
            }
            Err(e) => errors.push(e),
        }
    }
    (plugins, errors)
}

fn load_manifest(path: &Path) -> Result<PluginManifest, PluginLoadError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PluginLoadError::Io(path.to_path_buf(), e))?;
    toml::from_str(&raw).map_err(|e| PluginLoadError::Parse(path.to_path_buf(), e))
}
