//! clm-store
//!
//! Durable records of the market engine: `state.json` (last closes) and
//! `history.json` (dated snapshots), plus the run lock.
//!
//! Reads default to empty records when a file is absent (first run). A file
//! that exists but cannot be parsed is an error: the engine refuses to
//! overwrite data it could not read.

pub mod atomic;
pub mod history;
pub mod lock;

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clm_schemas::{HistoryEntry, MarketState};
use serde::de::DeserializeOwned;

pub use atomic::{stage_bytes, stage_json, StagedWrite};
pub use history::{normalize_history, upsert_history, UpsertOutcome};
pub use lock::RunLock;

pub const STATE_FILE: &str = "state.json";
pub const HISTORY_FILE: &str = "history.json";
pub const LOCK_FILE: &str = ".clm-run.lock";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        op: &'static str,
        detail: String,
    },
    /// The file exists but is not a valid record.
    Corrupt { path: PathBuf, detail: String },
    Serialize { what: &'static str, detail: String },
    /// Another run holds the lock.
    Locked { path: PathBuf, holder: String },
}

impl StoreError {
    pub fn io(path: &Path, op: &'static str, e: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            op,
            detail: e.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, op, detail } => {
                write!(f, "{op} failed for {}: {detail}", path.display())
            }
            StoreError::Corrupt { path, detail } => {
                write!(f, "unreadable record {}: {detail}", path.display())
            }
            StoreError::Serialize { what, detail } => {
                write!(f, "serialize {what} failed: {detail}")
            }
            StoreError::Locked { path, holder } => {
                write!(f, "run lock {} is held ({holder})", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketPaths {
    pub state: PathBuf,
    pub history: PathBuf,
    pub lock: PathBuf,
}

impl MarketPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            state: dir.join(STATE_FILE),
            history: dir.join(HISTORY_FILE),
            lock: dir.join(LOCK_FILE),
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(b) => Ok(Some(b)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, "read", e)),
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let Some(bytes) = read_optional(path)? else {
        return Ok(T::default());
    };
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Previous state; empty on first run.
pub fn load_state(path: &Path) -> Result<MarketState, StoreError> {
    load_or_default(path)
}

/// History sorted by date with duplicate dates collapsed; empty on first run.
pub fn load_history(path: &Path) -> Result<Vec<HistoryEntry>, StoreError> {
    let mut h: Vec<HistoryEntry> = load_or_default(path)?;
    normalize_history(&mut h);
    Ok(h)
}

// ---------------------------------------------------------------------------
// Two-record commit
// ---------------------------------------------------------------------------

/// Persist state and history together.
///
/// Both records are staged (written + synced) before either is renamed into
/// place. If the history rename fails after state was replaced, the previous
/// state bytes are restored before the error is returned.
pub fn commit_run(
    paths: &MarketPaths,
    state: &MarketState,
    history: &[HistoryEntry],
) -> Result<(), StoreError> {
    let prior_state = read_optional(&paths.state)?;

    let staged_state = stage_json("state", &paths.state, state)?;
    let staged_history = stage_json("history", &paths.history, &history)?;

    staged_state.commit()?;
    if let Err(e) = staged_history.commit() {
        tracing::warn!(
            path = %paths.state.display(),
            error = %e,
            "history commit failed; restoring previous state"
        );
        let restored = match &prior_state {
            Some(bytes) => stage_bytes(&paths.state, bytes).and_then(StagedWrite::commit),
            None => fs::remove_file(&paths.state)
                .map_err(|io| StoreError::io(&paths.state, "remove", io)),
        };
        if let Err(re) = restored {
            tracing::warn!(error = %re, "state rollback failed");
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn absent_files_load_as_empty_records() {
        let dir = tempfile::tempdir().unwrap();
        let paths = MarketPaths::in_dir(dir.path());
        assert_eq!(load_state(&paths.state).unwrap(), MarketState::default());
        assert!(load_history(&paths.history).unwrap().is_empty());
    }

    #[test]
    fn corrupt_state_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let paths = MarketPaths::in_dir(dir.path());
        fs::write(&paths.state, "{ not json").unwrap();
        assert!(matches!(
            load_state(&paths.state),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn commit_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = MarketPaths::in_dir(dir.path());

        let mut st = MarketState::default();
        st.last_close.insert("LUM".to_string(), 101.0);
        let h = vec![HistoryEntry {
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            closes: BTreeMap::from([("LUM".to_string(), 101.0)]),
        }];

        commit_run(&paths, &st, &h).unwrap();
        assert_eq!(load_state(&paths.state).unwrap(), st);
        assert_eq!(load_history(&paths.history).unwrap(), h);
    }

    #[test]
    fn failed_history_commit_restores_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let paths = MarketPaths::in_dir(dir.path());
        fs::write(&paths.state, "{\"lastClose\":{\"LUM\":100.0}}\n").unwrap();

        // A directory at the history path makes the rename fail.
        fs::create_dir(&paths.history).unwrap();
        fs::write(paths.history.join("blocker"), "x").unwrap();

        let mut st = MarketState::default();
        st.last_close.insert("LUM".to_string(), 105.0);
        assert!(commit_run(&paths, &st, &[]).is_err());

        let back = load_state(&paths.state).unwrap();
        assert_eq!(back.close("LUM"), Some(100.0));
    }
}
