use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Sentinel tick for a file that does not exist (or cannot be stat'ed).
pub const MISSING_TICK: i64 = -1;

/// Last-write timestamp of `path` in nanoseconds since the Unix epoch, or
/// [`MISSING_TICK`] when the file is absent.
pub fn mtime_tick(path: &Path) -> i64 {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(MISSING_TICK),
        Err(_) => MISSING_TICK,
    }
}

/// Write `bytes` to `path` only if the on-disk contents differ.
///
/// Returns `true` when the file was written. An identical file is left
/// untouched so its mtime does not move.
pub fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == bytes {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
