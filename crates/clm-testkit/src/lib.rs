//! Shared fixtures for scenario tests.
//!
//! - `MARKET_YAML`: the reference market config shipped in `config/`
//! - `neutral_input`: a day where every metric sits exactly on its baseline
//! - `MarketDir`: a throwaway data directory with config/input files

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clm_config::{load_layered_yaml_from_strings, MarketConfig};
use clm_schemas::{DailyInput, Demand, GroupInput};
use tempfile::TempDir;

pub const MARKET_YAML: &str = include_str!("../../../config/market.yaml");

/// Every configured ticker, in pipeline order.
pub const ALL_TICKERS: [&str; 10] = [
    "LUM", "SOL", "ACME", "BOLT", "CRUX", "T1", "T2", "DECA", "PENCIL", "PIZZA",
];

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("fixture date must be YYYY-MM-DD")
}

/// The reference config, optionally with YAML overlays applied on top.
pub fn market_config_with(overlays: &[&str]) -> MarketConfig {
    let mut docs = vec![MARKET_YAML];
    docs.extend_from_slice(overlays);
    let loaded = load_layered_yaml_from_strings(&docs).expect("fixture yaml must load");
    MarketConfig::from_json(&loaded.config_json).expect("fixture config must validate")
}

pub fn market_config() -> MarketConfig {
    market_config_with(&[])
}

/// A day where every metric equals its baseline, every factor is 0.5, and
/// both groups sit at the urgency curve midpoint. Every instrument's raw
/// target equals its previous close.
pub fn neutral_input(day: &str) -> DailyInput {
    let mut groups = BTreeMap::new();
    groups.insert(
        "mon_wed".to_string(),
        GroupInput {
            currency: Some("LUM".to_string()),
            exam_days: Some(5.0),
            participation_total: Some(120.0),
            headcount: Some(20.0),
            quiz_avg: Some(70.0),
            extra_total: Some(4.0),
            attendance_pct: Some(88.0),
        },
    );
    groups.insert(
        "tue_thu".to_string(),
        GroupInput {
            currency: Some("SOL".to_string()),
            exam_days: Some(5.0),
            participation_total: Some(100.0),
            headcount: Some(20.0),
            quiz_avg: Some(65.0),
            extra_total: Some(3.0),
            attendance_pct: Some(84.0),
        },
    );

    let factors = [("f1", 0.5), ("f2", 0.5), ("f3", 0.5)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Some(v)))
        .collect();

    let channels = [
        ("tenth_mw", 8.0),
        ("tenth_tt", 6.0),
        ("pizza", 20.0),
        ("pencil", 40.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Some(v)))
    .collect();

    DailyInput {
        date: date(day),
        groups,
        factors,
        demand: Demand {
            video_ratio: Some(0.6),
            video_volume: Some(120.0),
            channels,
        },
        social: Some(0.5),
    }
}

/// A day with every metric pinned to an extreme.
pub fn extreme_input(day: &str, high: bool) -> DailyInput {
    let mut d = neutral_input(day);
    let scale = if high { 1_000.0 } else { 0.0 };
    for g in d.groups.values_mut() {
        g.exam_days = Some(if high { 0.0 } else { 365.0 });
        g.participation_total = g.participation_total.map(|v| v * scale);
        g.quiz_avg = g.quiz_avg.map(|v| v * scale);
        g.extra_total = g.extra_total.map(|v| v * scale);
        g.attendance_pct = g.attendance_pct.map(|v| v * scale);
    }
    for v in d.factors.values_mut() {
        *v = Some(if high { 1.0 } else { 0.0 });
    }
    for v in d.demand.channels.values_mut() {
        *v = v.map(|x| x * scale);
    }
    d.demand.video_ratio = d.demand.video_ratio.map(|v| v * scale);
    d.demand.video_volume = d.demand.video_volume.map(|v| v * scale);
    d.social = Some(if high { 1.0 } else { 0.0 });
    d
}

/// Temporary market data directory.
pub struct MarketDir {
    tmp: TempDir,
}

impl MarketDir {
    pub fn new() -> Result<Self> {
        let tmp = tempfile::tempdir().context("create temp market dir")?;
        fs::write(tmp.path().join("market.yaml"), MARKET_YAML).context("write market.yaml")?;
        Ok(Self { tmp })
    }

    pub fn path(&self) -> &Path {
        self.tmp.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("market.yaml")
    }

    pub fn state_path(&self) -> PathBuf {
        self.path().join("state.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.path().join("history.json")
    }

    /// Write an extra config layer and return its path.
    pub fn write_overlay(&self, name: &str, yaml: &str) -> Result<PathBuf> {
        let p = self.path().join(name);
        fs::write(&p, yaml).with_context(|| format!("write overlay {}", p.display()))?;
        Ok(p)
    }

    /// Write a daily input as `daily-<date>.json` and return its path.
    pub fn write_input(&self, input: &DailyInput) -> Result<PathBuf> {
        let p = self.path().join(format!("daily-{}.json", input.date));
        let json = serde_json::to_string_pretty(input).context("serialize daily input")?;
        fs::write(&p, json).with_context(|| format!("write {}", p.display()))?;
        Ok(p)
    }

    pub fn write_raw(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let p = self.path().join(name);
        fs::write(&p, contents).with_context(|| format!("write {}", p.display()))?;
        Ok(p)
    }
}
