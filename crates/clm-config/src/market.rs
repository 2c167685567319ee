//! Typed market configuration.
//!
//! Weight tables are resolved into enums at load time ([`MetricKey`],
//! [`Driver`]) so the pricing code never looks fields up by name. A config
//! that names an unknown metric, factor, group or ticker is rejected here,
//! before any computation runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference retention of the history log.
pub const DEFAULT_HISTORY_RETENTION: usize = 180;

// ---------------------------------------------------------------------------
// Categories + metric keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Currency,
    Stock,
    Tenth,
    Aggregate,
    Good,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Currency => "currency",
            Category::Stock => "stock",
            Category::Tenth => "tenth",
            Category::Aggregate => "aggregate",
            Category::Good => "good",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized market-wide metric that can feed a macro factor or a good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Participation,
    /// Placeholder held at exactly 0.5.
    Neutral,
    Quiz,
    Extra,
    VideoRatio,
    VideoVolume,
    Urgency,
    Attendance,
    Social,
}

impl MetricKey {
    pub const ALL: [MetricKey; 9] = [
        MetricKey::Participation,
        MetricKey::Neutral,
        MetricKey::Quiz,
        MetricKey::Extra,
        MetricKey::VideoRatio,
        MetricKey::VideoVolume,
        MetricKey::Urgency,
        MetricKey::Attendance,
        MetricKey::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Participation => "participation",
            MetricKey::Neutral => "neutral",
            MetricKey::Quiz => "quiz",
            MetricKey::Extra => "extra",
            MetricKey::VideoRatio => "video_ratio",
            MetricKey::VideoVolume => "video_volume",
            MetricKey::Urgency => "urgency",
            MetricKey::Attendance => "attendance",
            MetricKey::Social => "social",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        MetricKey::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// What a consumable good's weight is attached to.
///
/// Written in config as a metric name (`"video_ratio"`) or as
/// `"demand.<channel>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Driver {
    Metric(MetricKey),
    Demand(String),
}

impl TryFrom<String> for Driver {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let t = s.trim();
        if let Some(channel) = t.strip_prefix("demand.") {
            if channel.is_empty() {
                return Err(format!("empty demand channel in driver '{s}'"));
            }
            return Ok(Driver::Demand(channel.to_string()));
        }
        MetricKey::parse(t).map(Driver::Metric).ok_or_else(|| {
            format!("unknown driver '{s}'. expected a metric name or demand.<channel>")
        })
    }
}

impl From<Driver> for String {
    fn from(d: Driver) -> Self {
        d.to_string()
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Metric(k) => f.write_str(k.as_str()),
            Driver::Demand(c) => write!(f, "demand.{c}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketConfig {
    pub globals: Globals,
    pub medias: Medias,
    #[serde(default)]
    pub macro_weights: MacroWeights,
    #[serde(default)]
    pub macro_apply: MacroApply,
    pub instruments: Instruments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Globals {
    pub ema_alpha_default: f64,
    pub clamp_defaults: ClampDefaults,
    pub exam_curve: ExamCurve,
    #[serde(default = "default_retention")]
    pub history_retention: usize,
    /// Names of the company factor scores a daily input may carry.
    #[serde(default)]
    pub factors: Vec<String>,
}

fn default_retention() -> usize {
    DEFAULT_HISTORY_RETENTION
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClampDefaults {
    pub currency: f64,
    pub stock: f64,
    pub tenth: f64,
    pub aggregate: f64,
    pub good: f64,
}

impl ClampDefaults {
    pub fn for_category(&self, c: Category) -> f64 {
        match c {
            Category::Currency => self.currency,
            Category::Stock => self.stock,
            Category::Tenth => self.tenth,
            Category::Aggregate => self.aggregate,
            Category::Good => self.good,
        }
    }
}

/// Logistic exam-urgency curve parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExamCurve {
    pub d0: f64,
    pub k: f64,
    pub clamp_days: f64,
}

/// Rolling baselines ("medias").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Medias {
    pub groups: BTreeMap<String, GroupMedia>,
    #[serde(default)]
    pub video_ratio: f64,
    #[serde(default)]
    pub video_volume: f64,
    #[serde(default)]
    pub social: f64,
    #[serde(default)]
    pub demand: BTreeMap<String, f64>,
}

impl Medias {
    /// Baseline of a demand channel; 0 (neutral) when not configured.
    pub fn demand_baseline(&self, channel: &str) -> f64 {
        self.demand.get(channel).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupMedia {
    #[serde(default)]
    pub participation_per_head: f64,
    #[serde(default)]
    pub quiz: f64,
    #[serde(default)]
    pub extra: f64,
    #[serde(default)]
    pub attendance: f64,
}

/// Contribution of each metric to each macro factor. Absent metrics do not
/// contribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroWeights {
    #[serde(default)]
    pub pi: BTreeMap<MetricKey, f64>,
    #[serde(default)]
    pub confidence: BTreeMap<MetricKey, f64>,
    #[serde(default)]
    pub volatility: BTreeMap<MetricKey, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroCoefficients {
    #[serde(default)]
    pub pi: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub volatility: f64,
}

/// How strongly the macro factors gate each instrument class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroApply {
    #[serde(default)]
    pub currency: MacroCoefficients,
    #[serde(default)]
    pub stock: MacroCoefficients,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Instruments {
    #[serde(default)]
    pub currencies: BTreeMap<String, CurrencySpec>,
    #[serde(default)]
    pub stocks: BTreeMap<String, StockSpec>,
    #[serde(default)]
    pub tenths: BTreeMap<String, TenthSpec>,
    #[serde(default)]
    pub aggregate: Option<AggregateSpec>,
    #[serde(default)]
    pub goods: BTreeMap<String, GoodSpec>,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurrencySpec {
    pub base_price: f64,
    #[serde(default)]
    pub clamp_pct: Option<f64>,
    #[serde(default)]
    pub alpha: Option<f64>,
    /// Scales the participation ratio's deviation from 1.
    #[serde(default = "one")]
    pub sensitivity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockSpec {
    pub base_price: f64,
    #[serde(default)]
    pub clamp_pct: Option<f64>,
    #[serde(default)]
    pub alpha: Option<f64>,
    /// Name of the daily factor score driving this company.
    pub factor: String,
    #[serde(default = "one")]
    pub factor_scale: f64,
    #[serde(default)]
    pub exam_sensitivity: f64,
    /// Group whose urgency gates this stock; market maximum when unset.
    #[serde(default)]
    pub exam_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenthSpec {
    pub base_price: f64,
    #[serde(default)]
    pub clamp_pct: Option<f64>,
    /// Group whose quiz/participation/urgency drive this unit; market-wide
    /// values when unset.
    #[serde(default)]
    pub group: Option<String>,
    pub demand_channel: String,
    pub weights: TenthWeights,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenthWeights {
    #[serde(default)]
    pub demand: f64,
    #[serde(default)]
    pub quiz: f64,
    #[serde(default)]
    pub urgency: f64,
    #[serde(default)]
    pub inv_participation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSpec {
    pub ticker: String,
    pub base_price: f64,
    #[serde(default)]
    pub clamp_pct: Option<f64>,
    pub multiplier: f64,
    #[serde(default)]
    pub floor: f64,
    /// Tenth tickers whose same-run closes this aggregate follows.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoodSpec {
    pub base_price: f64,
    #[serde(default)]
    pub clamp_pct: Option<f64>,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub weights: BTreeMap<Driver, f64>,
}

/// Flat view of one configured instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentRef<'a> {
    pub ticker: &'a str,
    pub category: Category,
    pub base_price: f64,
    pub clamp_pct: f64,
}

// ---------------------------------------------------------------------------
// Loading + validation
// ---------------------------------------------------------------------------

impl MarketConfig {
    /// Deserialize from merged config JSON and validate.
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: MarketConfig =
            serde_json::from_value(v.clone()).context("CONFIG_INVALID: schema mismatch")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve an instrument's clamp percentage.
    pub fn clamp_pct(&self, category: Category, own: Option<f64>) -> f64 {
        own.unwrap_or_else(|| self.globals.clamp_defaults.for_category(category))
    }

    /// Resolve an instrument's smoothing factor.
    pub fn alpha(&self, own: Option<f64>) -> f64 {
        own.unwrap_or(self.globals.ema_alpha_default)
    }

    /// Every configured instrument in pipeline order.
    pub fn instruments(&self) -> Vec<InstrumentRef<'_>> {
        let ins = &self.instruments;
        let mut out = Vec::new();
        for (t, s) in &ins.currencies {
            out.push(self.instrument_ref(t, Category::Currency, s.base_price, s.clamp_pct));
        }
        for (t, s) in &ins.stocks {
            out.push(self.instrument_ref(t, Category::Stock, s.base_price, s.clamp_pct));
        }
        for (t, s) in &ins.tenths {
            out.push(self.instrument_ref(t, Category::Tenth, s.base_price, s.clamp_pct));
        }
        if let Some(a) = &ins.aggregate {
            out.push(self.instrument_ref(&a.ticker, Category::Aggregate, a.base_price, a.clamp_pct));
        }
        for (t, s) in &ins.goods {
            out.push(self.instrument_ref(t, Category::Good, s.base_price, s.clamp_pct));
        }
        out
    }

    fn instrument_ref<'a>(
        &self,
        ticker: &'a str,
        category: Category,
        base_price: f64,
        own_clamp: Option<f64>,
    ) -> InstrumentRef<'a> {
        InstrumentRef {
            ticker,
            category,
            base_price,
            clamp_pct: self.clamp_pct(category, own_clamp),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.globals;
        check_unit_open_closed("globals.ema_alpha_default", g.ema_alpha_default)?;
        let cd = &g.clamp_defaults;
        for (name, v) in [
            ("currency", cd.currency),
            ("stock", cd.stock),
            ("tenth", cd.tenth),
            ("aggregate", cd.aggregate),
            ("good", cd.good),
        ] {
            check_clamp(&format!("globals.clamp_defaults.{name}"), v)?;
        }
        let ec = &g.exam_curve;
        check_finite("globals.exam_curve.d0", ec.d0)?;
        check_finite("globals.exam_curve.k", ec.k)?;
        check_finite("globals.exam_curve.clamp_days", ec.clamp_days)?;
        if ec.clamp_days <= 1.0 {
            bail!(
                "CONFIG_INVALID globals.exam_curve.clamp_days: must be > 1 (got {})",
                ec.clamp_days
            );
        }
        if g.history_retention == 0 {
            bail!("CONFIG_INVALID globals.history_retention: must be >= 1");
        }

        let m = &self.medias;
        for (name, v) in [
            ("video_ratio", m.video_ratio),
            ("video_volume", m.video_volume),
            ("social", m.social),
        ] {
            check_baseline(&format!("medias.{name}"), v)?;
        }
        for (ch, v) in &m.demand {
            check_baseline(&format!("medias.demand.{ch}"), *v)?;
        }
        for (id, gm) in &m.groups {
            for (name, v) in [
                ("participation_per_head", gm.participation_per_head),
                ("quiz", gm.quiz),
                ("extra", gm.extra),
                ("attendance", gm.attendance),
            ] {
                check_baseline(&format!("medias.groups.{id}.{name}"), v)?;
            }
        }

        for (factor, table) in [
            ("pi", &self.macro_weights.pi),
            ("confidence", &self.macro_weights.confidence),
            ("volatility", &self.macro_weights.volatility),
        ] {
            for (k, w) in table {
                check_finite(&format!("macro_weights.{factor}.{}", k.as_str()), *w)?;
            }
        }
        for (class, c) in [
            ("currency", &self.macro_apply.currency),
            ("stock", &self.macro_apply.stock),
        ] {
            check_finite(&format!("macro_apply.{class}.pi"), c.pi)?;
            check_finite(&format!("macro_apply.{class}.confidence"), c.confidence)?;
            check_finite(&format!("macro_apply.{class}.volatility"), c.volatility)?;
        }

        self.validate_instruments()
    }

    fn validate_instruments(&self) -> Result<()> {
        let ins = &self.instruments;
        let groups = &self.medias.groups;
        let factors: BTreeSet<&str> = self.globals.factors.iter().map(String::as_str).collect();

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for r in self.instruments() {
            if r.ticker.trim().is_empty() {
                bail!("CONFIG_INVALID instruments: empty ticker in {}", r.category);
            }
            if !seen.insert(r.ticker) {
                bail!("CONFIG_INVALID instruments: duplicate ticker '{}'", r.ticker);
            }
            let path = format!("instruments.{}", r.ticker);
            if !(r.base_price.is_finite() && r.base_price > 0.0) {
                bail!(
                    "CONFIG_INVALID {path}.base_price: must be > 0 (got {})",
                    r.base_price
                );
            }
            check_clamp(&format!("{path}.clamp_pct"), r.clamp_pct)?;
        }

        for (t, s) in &ins.currencies {
            check_alpha(t, s.alpha)?;
            check_finite(&format!("instruments.currencies.{t}.sensitivity"), s.sensitivity)?;
        }
        for (t, s) in &ins.stocks {
            check_alpha(t, s.alpha)?;
            if !factors.contains(s.factor.as_str()) {
                bail!(
                    "CONFIG_INVALID instruments.stocks.{t}.factor: '{}' is not listed in globals.factors",
                    s.factor
                );
            }
            check_finite(&format!("instruments.stocks.{t}.factor_scale"), s.factor_scale)?;
            check_finite(
                &format!("instruments.stocks.{t}.exam_sensitivity"),
                s.exam_sensitivity,
            )?;
            check_group(groups, &format!("instruments.stocks.{t}.exam_group"), &s.exam_group)?;
        }
        for (t, s) in &ins.tenths {
            check_group(groups, &format!("instruments.tenths.{t}.group"), &s.group)?;
            if s.demand_channel.trim().is_empty() {
                bail!("CONFIG_INVALID instruments.tenths.{t}.demand_channel: empty");
            }
            let w = &s.weights;
            for (name, v) in [
                ("demand", w.demand),
                ("quiz", w.quiz),
                ("urgency", w.urgency),
                ("inv_participation", w.inv_participation),
            ] {
                check_finite(&format!("instruments.tenths.{t}.weights.{name}"), v)?;
            }
        }
        if let Some(a) = &ins.aggregate {
            let path = format!("instruments.aggregate.{}", a.ticker);
            if !(a.multiplier.is_finite() && a.multiplier > 0.0) {
                bail!("CONFIG_INVALID {path}.multiplier: must be > 0 (got {})", a.multiplier);
            }
            if !(a.floor.is_finite() && a.floor >= 0.0) {
                bail!("CONFIG_INVALID {path}.floor: must be >= 0 (got {})", a.floor);
            }
            if a.sources.is_empty() {
                bail!("CONFIG_INVALID {path}.sources: at least one tenth is required");
            }
            for src in &a.sources {
                if !ins.tenths.contains_key(src) {
                    bail!("CONFIG_INVALID {path}.sources: '{src}' is not a configured tenth");
                }
            }
        }
        for (t, s) in &ins.goods {
            check_alpha(t, s.alpha)?;
            for (d, w) in &s.weights {
                check_finite(&format!("instruments.goods.{t}.weights.{d}"), *w)?;
            }
        }
        Ok(())
    }
}

fn check_finite(path: &str, v: f64) -> Result<()> {
    if !v.is_finite() {
        bail!("CONFIG_INVALID {path}: must be finite (got {v})");
    }
    Ok(())
}

fn check_baseline(path: &str, v: f64) -> Result<()> {
    if !(v.is_finite() && v >= 0.0) {
        bail!("CONFIG_INVALID {path}: baseline must be >= 0 (got {v})");
    }
    Ok(())
}

fn check_clamp(path: &str, v: f64) -> Result<()> {
    if !(v.is_finite() && v > 0.0 && v < 1.0) {
        bail!("CONFIG_INVALID {path}: clamp must be in (0,1) (got {v})");
    }
    Ok(())
}

fn check_unit_open_closed(path: &str, v: f64) -> Result<()> {
    if !(v.is_finite() && v > 0.0 && v <= 1.0) {
        bail!("CONFIG_INVALID {path}: must be in (0,1] (got {v})");
    }
    Ok(())
}

fn check_alpha(ticker: &str, alpha: Option<f64>) -> Result<()> {
    match alpha {
        Some(a) => check_unit_open_closed(&format!("instruments.{ticker}.alpha"), a),
        None => Ok(()),
    }
}

fn check_group(
    groups: &BTreeMap<String, GroupMedia>,
    path: &str,
    group: &Option<String>,
) -> Result<()> {
    if let Some(id) = group {
        if !groups.contains_key(id) {
            bail!("CONFIG_INVALID {path}: unknown group '{id}'");
        }
    }
    Ok(())
}
