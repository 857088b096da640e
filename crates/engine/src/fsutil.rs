// SPDX-License-Identifier: MIT

//! Small filesystem helpers shared across the ingest, dispatch, and
//! self-heal modules.

use std::path::Path;

/// Rename `from` to `to`, creating `to`'s parent directory first.
pub fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(from, to)
}
