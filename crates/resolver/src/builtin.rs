// SPDX-License-Identifier: MIT

//! Built-in command resolvers.
//!
//! `args`/`flags`/`files` are three ordered sequences concatenated in a
//! documented order (per spec §9): `flags ++ args ++ files` for the
//! fallback resolver, `[--message-file <prompt>] ++ flags ++ files` for
//! the AI-tool builtins, and `args` only for the version-control builtin.

use crate::error::ResolveError;
use crate::safety::check_git_args;
use qr_core::task::ValidatedTask;

/// The resolved executable and argument vector for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub executable: String,
    pub arguments: Vec<String>,
}

const AI_TOOLS: &[&str] = &["aider", "codex", "claude"];
const VCS_TOOL: &str = "git";

/// Resolve a task using only the built-in resolvers (no plugins). Returns
/// `None` if no built-in applies and the caller should fall back to the
/// generic fallback resolver.
pub fn resolve_builtin(
    task: &ValidatedTask,
    prompt_file: Option<&str>,
) -> Option<Result<ResolvedCommand, ResolveError>> {
    if AI_TOOLS.contains(&task.tool.as_str()) {
        return Some(Ok(resolve_ai_tool(task, prompt_file)));
    }
    if task.tool == VCS_TOOL {
        return Some(resolve_git(task));
    }
    None
}

fn resolve_ai_tool(task: &ValidatedTask, prompt_file: Option<&str>) -> ResolvedCommand {
    let mut arguments = Vec::new();
    if let Some(pf) = prompt_file {
        arguments.push("--message-file".to_string());
        arguments.push(pf.to_string());
    }
    arguments.extend(task.flags.iter().cloned());
    arguments.extend(task.files.iter().cloned());
    ResolvedCommand { executable: task.tool.clone(), arguments }
}

fn resolve_git(task: &ValidatedTask) -> Result<ResolvedCommand, ResolveError> {
    if let Some(reason) = check_git_args(&task.args) {
        return Err(ResolveError::Rejected(reason));
    }
    Ok(ResolvedCommand { executable: VCS_TOOL.to_string(), arguments: task.args.clone() })
}

/// The generic fallback used when neither a plugin nor a built-in applies.
pub fn resolve_fallback(task: &ValidatedTask, prompt_file: Option<&str>) -> ResolvedCommand {
    let mut arguments = Vec::new();
    if let Some(pf) = prompt_file {
        arguments.push("--message-file".to_string());
        arguments.push(pf.to_string());
    }
    arguments.extend(task.flags.iter().cloned());
    arguments.extend(task.args.iter().cloned());
    arguments.extend(task.files.iter().cloned());
    ResolvedCommand { executable: task.tool.clone(), arguments }
}
