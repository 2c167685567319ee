//! Daily run orchestration.
//!
//! load config + daily input -> lock -> load state/history -> price ->
//! build new state + history -> commit both -> unlock
//!
//! Every fault before the commit leaves both records untouched. The commit
//! itself is all-or-nothing per file (see `clm_store::commit_run`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clm_config::{load_market_config, sha256_hex, MarketConfig};
use clm_pricing::{run_pipeline, InstrumentUpdate, MacroFactors, PricingError};
use clm_schemas::{DailyInput, HistoryEntry, MarketState};
use clm_store::{commit_run, load_history, load_state, upsert_history, MarketPaths, RunLock};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{InputKind, RunError};

/// Everything a run needs to locate its inputs and records.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Config layers in merge order.
    pub config_paths: Vec<PathBuf>,
    pub input_path: PathBuf,
    pub paths: MarketPaths,
    /// Compute and report without locking or writing.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub config_hash: String,
    /// State as persisted (or as it would be, on a dry run).
    pub state: MarketState,
    /// False for a backfill: the state already describes a later day.
    pub state_advanced: bool,
    pub macro_factors: MacroFactors,
    pub updates: Vec<InstrumentUpdate>,
    /// Tickers present in the previous state but no longer configured.
    pub carried: Vec<String>,
    pub history_len: usize,
    pub history_replaced: bool,
    pub evicted: Vec<NaiveDate>,
    pub persisted: bool,
}

/// Pure part of a run: next state from config, input and the pricing basis.
#[derive(Debug, Clone)]
pub struct NextState {
    pub state: MarketState,
    pub updates: Vec<InstrumentUpdate>,
    pub macro_factors: MacroFactors,
    pub carried: Vec<String>,
}

/// Closes a run for `date` prices from.
///
/// Normally the current state. When history already holds `date` or a later
/// day (a rerun or a backfill), the state no longer describes the eve of
/// `date`, so the closes come from the last history entry strictly before it
/// (empty when there is none). Smoothing buffers always come from the state.
pub fn pricing_basis(state: &MarketState, history: &[HistoryEntry], date: NaiveDate) -> MarketState {
    match history.last() {
        Some(newest) if newest.date >= date => MarketState {
            last_close: history
                .iter()
                .rev()
                .find(|e| e.date < date)
                .map(|e| e.closes.clone())
                .unwrap_or_default(),
            ema_buffers: state.ema_buffers.clone(),
        },
        _ => state.clone(),
    }
}

/// Price every configured instrument from `basis`, then lay the new closes
/// over `current` so unconfigured tickers are carried.
pub fn compute_next_state(
    cfg: &MarketConfig,
    input: &DailyInput,
    basis: &MarketState,
    current: &MarketState,
) -> Result<NextState, PricingError> {
    let outcome = run_pipeline(cfg, input, basis)?;

    let carried: Vec<String> = current
        .last_close
        .keys()
        .filter(|t| !outcome.closes.contains_key(*t))
        .cloned()
        .collect();

    let mut last_close = current.last_close.clone();
    last_close.extend(outcome.closes);

    Ok(NextState {
        state: MarketState {
            last_close,
            ema_buffers: current.ema_buffers.clone(),
        },
        updates: outcome.updates,
        macro_factors: outcome.macro_factors,
        carried,
    })
}

/// Deterministic run id: same date, config and input => same id.
pub fn derive_run_id(date: NaiveDate, config_hash: &str, input_hash: &str) -> Uuid {
    let name = format!("{date}|{config_hash}|{input_hash}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

pub fn load_daily_input(path: &Path) -> anyhow::Result<DailyInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read daily input: {}", path.display()))?;
    let raw = raw.trim_start_matches('\u{feff}');
    let input: DailyInput = serde_json::from_str(raw)
        .with_context(|| format!("invalid daily input: {}", path.display()))?;
    Ok(input)
}

pub fn run_daily_update(req: &RunRequest) -> Result<RunReport, RunError> {
    let config_paths: Vec<String> = req
        .config_paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let config_refs: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let (loaded, cfg) = load_market_config(&config_refs)
        .map_err(|e| RunError::bad_input(InputKind::Config, &e))?;
    let input = load_daily_input(&req.input_path)
        .map_err(|e| RunError::bad_input(InputKind::DailyInput, &e))?;

    let input_json = serde_json::to_string(&input).map_err(|e| RunError::BadInput {
        input: InputKind::DailyInput,
        detail: e.to_string(),
    })?;
    let run_id = derive_run_id(input.date, &loaded.config_hash, &sha256_hex(input_json.as_bytes()));

    info!(
        %run_id,
        date = %input.date,
        config_hash = %loaded.config_hash,
        dry_run = req.dry_run,
        "daily update start"
    );

    // Held until the end of this function, released on every exit path.
    let _lock = if req.dry_run {
        None
    } else {
        let lock = RunLock::acquire(&req.paths.lock)?;
        debug!(lock = %lock.path().display(), "run lock acquired");
        Some(lock)
    };

    let current = load_state(&req.paths.state)?;
    let mut history = load_history(&req.paths.history)?;

    // A backfill rewrites its history entry but leaves the newer state alone.
    let is_latest = history.last().map_or(true, |e| e.date <= input.date);
    let basis = pricing_basis(&current, &history, input.date);
    if history.last().is_some_and(|e| e.date >= input.date) {
        info!(
            date = %input.date,
            backfill = !is_latest,
            "date already recorded; pricing from the close before it"
        );
    }

    let next = compute_next_state(&cfg, &input, &basis, &current)?;
    let mf = &next.macro_factors;
    debug!(
        pi = mf.pi,
        confidence = mf.confidence,
        volatility = mf.volatility,
        "macro factors"
    );
    for u in &next.updates {
        debug!(
            ticker = %u.ticker,
            category = %u.category,
            prev = u.prev,
            raw = u.raw,
            close = u.close,
            "instrument update"
        );
    }
    if !next.carried.is_empty() {
        warn!(tickers = ?next.carried, "carrying closes of unconfigured instruments");
    }

    let upsert = upsert_history(
        &mut history,
        HistoryEntry {
            date: input.date,
            closes: next.state.last_close.clone(),
        },
        cfg.globals.history_retention,
    );
    if !upsert.evicted.is_empty() {
        warn!(evicted = ?upsert.evicted, "history retention evicted entries");
    }

    let state = if is_latest { next.state } else { current };
    if !req.dry_run {
        commit_run(&req.paths, &state, &history)?;
    }

    info!(
        %run_id,
        date = %input.date,
        instruments = next.updates.len(),
        history_len = history.len(),
        persisted = !req.dry_run,
        "daily update done"
    );

    Ok(RunReport {
        run_id,
        date: input.date,
        config_hash: loaded.config_hash,
        state,
        state_advanced: is_latest,
        macro_factors: next.macro_factors,
        updates: next.updates,
        carried: next.carried,
        history_len: history.len(),
        history_replaced: upsert.replaced,
        evicted: upsert.evicted,
        persisted: !req.dry_run,
    })
}
