//! Write-to-temp-then-rename file replacement.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::{Error, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Leading marker of every in-flight temp file. Attachment names may not use it.
pub const TEMP_PREFIX: &str = ".tv-tmp.";

/// Temp file next to `path`, unique per process and call.
fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::invalid(format!("not a file path: {}", path.display())))?
        .to_string_lossy();
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!("{}{}.{}.{}", TEMP_PREFIX, file_name, std::process::id(), n);
    Ok(path.with_file_name(temp_name))
}

/// Replace `path` with `contents` so readers see either the old or the new file.
///
/// The temp file lives in the same directory so the rename stays on one filesystem.
pub fn write_atomic(path: &Path, contents: &[u8], fsync: bool) -> Result<()> {
    let temp_path = temp_path_for(path)?;

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents)?;
        if fsync {
            file.sync_all()?;
        }
        drop(file);
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T, fsync: bool) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    write_atomic(path, &json, fsync)
}
