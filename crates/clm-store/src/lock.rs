//! Run-level advisory lock.
//!
//! One run at a time per data directory. The lock file is created with
//! `create_new`, so a second run fails fast instead of interleaving its
//! reads and writes with the first. The file is removed on drop.
//!
//! A crashed run leaves the file behind; it names the holder's pid and
//! acquisition time and must be removed by the operator.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::StoreError;

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, "create_dir_all", e))?;
        }

        let mut f = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(StoreError::Locked { path, holder });
            }
            Err(e) => return Err(StoreError::io(&path, "create lock", e)),
        };

        let holder = format!("pid={} acquired_at_utc={}", std::process::id(), Utc::now().to_rfc3339());
        if let Err(e) = f.write_all(holder.as_bytes()) {
            let _ = fs::remove_file(&path);
            return Err(StoreError::io(&path, "write lock", e));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_first_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join(".clm-run.lock");

        let first = RunLock::acquire(&p).unwrap();
        let err = RunLock::acquire(&p).unwrap_err();
        match err {
            StoreError::Locked { holder, .. } => assert!(holder.starts_with("pid=")),
            other => panic!("expected Locked, got {other:?}"),
        }

        drop(first);
        assert!(!p.exists());
        assert!(RunLock::acquire(&p).is_ok());
    }
}
