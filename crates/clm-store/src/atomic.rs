//! Atomic file replacement.
//!
//! Bytes go to a temp file in the destination directory, are synced, and
//! only then renamed over the target. A reader sees the old file or the new
//! file, never a partial one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::StoreError;

/// A fully written, synced temp file waiting to be renamed into place.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl StagedWrite {
    /// Rename the staged file over the target.
    pub fn commit(self) -> Result<(), StoreError> {
        let target = self.target;
        self.tmp
            .persist(&target)
            .map_err(|e| StoreError::io(&target, "rename", e.error))?;
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Write `bytes` next to `target` without touching `target` yet.
pub fn stage_bytes(target: &Path, bytes: &[u8]) -> Result<StagedWrite, StoreError> {
    let dir = parent_dir(target);
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, "create_dir_all", e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, "create temp", e))?;
    tmp.write_all(bytes)
        .map_err(|e| StoreError::io(tmp.path(), "write temp", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(tmp.path(), "sync temp", e))?;

    Ok(StagedWrite {
        target: target.to_path_buf(),
        tmp,
    })
}

/// Pretty JSON with a trailing newline.
fn to_json_bytes<T: Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialize {
        what,
        detail: e.to_string(),
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn stage_json<T: Serialize>(
    what: &'static str,
    target: &Path,
    value: &T,
) -> Result<StagedWrite, StoreError> {
    let bytes = to_json_bytes(what, value)?;
    stage_bytes(target, &bytes)
}
