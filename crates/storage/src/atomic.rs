// SPDX-License-Identifier: MIT

//! Temp-file-plus-rename helper shared by every state file the worker owns.

use std::io;
use std::path::Path;

/// Write `contents` to `path` by first writing a sibling temp file and then
/// renaming it into place, so readers never observe a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
        std::process::id()
    ));
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
