use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

/// Atomically replaces `path` with `content`.
///
/// The bytes go to a hidden sibling file first, are synced to disk, and the
/// file is then renamed over `path`. Readers see either the old feed or the
/// new one. Missing parent directories are created.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory '{}'", dir.display()))?;
    }

    let temp = sibling_temp_path(path);
    write_synced(&temp, content)
        .and_then(|()| replace(&temp, path))
        .inspect_err(|_| {
            let _ = std::fs::remove_file(&temp);
        })
}

/// `dir/.feed.xml.<nanos>.tmp` next to `dir/feed.xml`.
fn sibling_temp_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{nanos:x}.tmp"))
}

fn write_synced(temp: &Path, content: &[u8]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp)
        .with_context(|| format!("Failed to create '{}'", temp.display()))?;
    file.write_all(content)
        .with_context(|| format!("Failed to write '{}'", temp.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync '{}'", temp.display()))
}

fn replace(temp: &Path, path: &Path) -> Result<()> {
    #[cfg(windows)]
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove old '{}'", path.display()))?;
    }
    std::fs::rename(temp, path).with_context(|| {
        format!("Failed to move '{}' to '{}'", temp.display(), path.display())
    })
}
