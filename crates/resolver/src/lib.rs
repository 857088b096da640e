// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! qr-resolver: the Command Resolver (spec §4.3) — built-in resolvers for
//! `aider`/`codex`/`claude`/`git`, the generic fallback, and a plugin
//! registry keyed by tool name that wins over any built-in.

pub mod builtin;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod safety;

pub use builtin::{resolve_builtin, resolve_fallback, ResolvedCommand};
pub use error::{PluginLoadError, PluginResolveError, ResolveError};
pub use plugin::{Plugin, PluginManifest};
pub use registry::CommandResolver;
