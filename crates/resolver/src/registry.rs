// SPDX-License-Identifier: MIT

//! The command resolver registry: plugins registered for a tool win over
//! built-ins; built-ins win over the generic fallback.

use crate::builtin::{resolve_builtin, resolve_fallback, ResolvedCommand};
use crate::error::ResolveError;
use crate::plugin::{scan_plugins, Plugin, PluginLoadError};
use qr_core::task::ValidatedTask;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

pub struct CommandResolver {
    plugins: HashMap<String, Plugin>,
}

impl CommandResolver {
    /// Scan `plugins_dir` for manifests. Load failures are logged, not
    /// fatal — this never fails startup.
    pub fn load(plugins_dir: &Path) -> Self {
        let (found, errors) = scan_plugins(plugins_dir);
        for e in &errors {
            warn!(error = %e, "skipping malformed plugin manifest");
        }
        let mut plugins = HashMap::new();
        for plugin in found {
            if plugins.insert(plugin.manifest.tool.clone(), plugin).is_some() {
                warn!(tool = %plugins_dir.display(), "duplicate plugin registration, last one wins");
            }
        }
        Self { plugins }
    }

    pub fn empty() -> Self {
        Self { plugins: HashMap::new() }
    }

    pub fn plugin_load_errors(plugins_dir: &Path) -> Vec<PluginLoadError> {
        scan_plugins(plugins_dir).1
    }

    /// Resolve a task to an executable + argument vector.
    ///
    /// A plugin registered for this tool always wins over a built-in; the
    /// built-ins (`aider`, `codex`, `claude`, `git`) win over the generic
    /// fallback, per spec §4.3. A plugin registered for `git` bypasses the
    /// rollback/ safety check entirely, since that check lives in the git
    /// builtin; no shipped plugin targets `git`.
    pub async fn resolve(
        &self,
        task: &ValidatedTask,
        prompt_file: Option<&str>,
    ) -> Result<ResolvedCommand, ResolveError> {
        if let Some(plugin) = self.plugins.get(&task.tool) {
            return plugin
                .resolve_command(task, prompt_file)
                .await
                .map_err(|e| ResolveError::Rejected(format!("plugin error: {e}")));
        }

        if let Some(result) = resolve_builtin(task, prompt_file) {
            return result;
        }

        Ok(resolve_fallback(task, prompt_file))
    }
}
