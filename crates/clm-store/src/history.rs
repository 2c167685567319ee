//! Bounded, date-keyed history log.
//!
//! Invariants after every [`upsert_history`]:
//! - at most one entry per date
//! - entries sorted by date, oldest first
//! - `len <= retention`, oldest evicted first

use chrono::NaiveDate;
use clm_schemas::HistoryEntry;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpsertOutcome {
    /// True when an entry for the same date was overwritten.
    pub replaced: bool,
    /// Dates evicted to stay within retention, oldest first.
    pub evicted: Vec<NaiveDate>,
}

pub fn upsert_history(
    history: &mut Vec<HistoryEntry>,
    entry: HistoryEntry,
    retention: usize,
) -> UpsertOutcome {
    let mut out = UpsertOutcome::default();

    match history.binary_search_by(|e| e.date.cmp(&entry.date)) {
        Ok(i) => {
            history[i] = entry;
            out.replaced = true;
        }
        Err(i) => history.insert(i, entry),
    }

    let retention = retention.max(1);
    if history.len() > retention {
        let excess = history.len() - retention;
        out.evicted = history.drain(..excess).map(|e| e.date).collect();
    }
    out
}

/// Sort by date and collapse duplicate dates, keeping the last occurrence.
///
/// Applied to history read from disk so hand-edited files still satisfy the
/// invariants above.
pub fn normalize_history(history: &mut Vec<HistoryEntry>) {
    history.sort_by(|a, b| a.date.cmp(&b.date));
    let mut out: Vec<HistoryEntry> = Vec::with_capacity(history.len());
    for e in history.drain(..) {
        match out.last_mut() {
            Some(last) if last.date == e.date => *last = e,
            _ => out.push(e),
        }
    }
    *history = out;
}
