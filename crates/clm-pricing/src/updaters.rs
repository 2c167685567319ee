//! Per-category price updaters.
//!
//! Every updater has the same shape:
//! 1. raw target from category drivers
//! 2. optional exponential smoothing toward the previous close
//! 3. clamp to the instrument's maximum one-run move
//!
//! Step 3 is unconditional. No driver, however extreme, can move an
//! instrument by more than its clamp percentage in one run.

use std::collections::BTreeMap;

use clm_config::{
    AggregateSpec, Category, CurrencySpec, Driver, GoodSpec, MarketConfig, StockSpec, TenthSpec,
};
use clm_schemas::DailyInput;
use serde::Serialize;

use crate::macro_factors::MacroFactors;
use crate::norm::{clamp_move, dev, ema, norm_vs_media};
use crate::PricingError;

/// Trace of one instrument's update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentUpdate {
    pub ticker: String,
    pub category: Category,
    pub prev: f64,
    pub raw: f64,
    pub smoothed: f64,
    pub close: f64,
}

/// Read-only inputs shared by every updater in a run.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    pub cfg: &'a MarketConfig,
    pub input: &'a DailyInput,
    pub macro_factors: &'a MacroFactors,
}

/// Smooth (when `alpha` is set), clamp, and check the result is usable.
fn finish(
    ticker: &str,
    category: Category,
    prev: f64,
    raw: f64,
    alpha: Option<f64>,
    clamp_pct: f64,
) -> Result<InstrumentUpdate, PricingError> {
    if !raw.is_finite() {
        return Err(PricingError::NonFinite {
            ticker: ticker.to_string(),
            stage: "raw",
            value: raw,
        });
    }
    let smoothed = match alpha {
        Some(a) => ema(prev, raw, a),
        None => raw,
    };
    let close = clamp_move(prev, smoothed, clamp_pct);
    if !close.is_finite() || close <= 0.0 {
        return Err(PricingError::NonFinite {
            ticker: ticker.to_string(),
            stage: "close",
            value: close,
        });
    }
    Ok(InstrumentUpdate {
        ticker: ticker.to_string(),
        category,
        prev,
        raw,
        smoothed,
        close,
    })
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Participation-driven currency.
///
/// `ratio = perHead / groupBaseline` (1 when either side is missing), then
/// `raw = prev · (1 + sensitivity·(ratio − 1)) · macroGate`.
pub fn update_currency(
    ctx: &PricingContext<'_>,
    ticker: &str,
    spec: &CurrencySpec,
    prev: f64,
) -> Result<InstrumentUpdate, PricingError> {
    let ratio = ctx
        .input
        .group_for_currency(ticker)
        .and_then(|(group_id, g)| {
            let media = ctx.cfg.medias.groups.get(group_id)?.participation_per_head;
            let per_head = g.participation_per_head()?;
            (media > 0.0).then_some(per_head / media)
        })
        .unwrap_or(1.0);

    let gate = ctx.macro_factors.gate(&ctx.cfg.macro_apply.currency);
    let raw = prev * (1.0 + spec.sensitivity * (ratio - 1.0)) * gate;

    finish(
        ticker,
        Category::Currency,
        prev,
        raw,
        Some(ctx.cfg.alpha(spec.alpha)),
        ctx.cfg.clamp_pct(Category::Currency, spec.clamp_pct),
    )
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

/// Company-factor stock with a macro gate and an exam-urgency gate.
///
/// `raw = prev · (1 + factor_scale·(f − 0.5)) · macroGate · max(0, 1 + exam_sensitivity·(U − 0.5))`
pub fn update_stock(
    ctx: &PricingContext<'_>,
    ticker: &str,
    spec: &StockSpec,
    prev: f64,
) -> Result<InstrumentUpdate, PricingError> {
    let f = ctx.input.factor(&spec.factor).unwrap_or(0.5);
    let gate = ctx.macro_factors.gate(&ctx.cfg.macro_apply.stock);
    let urgency = ctx.macro_factors.urgency(spec.exam_group.as_deref());
    let exam_gate = (1.0 + spec.exam_sensitivity * dev(urgency)).max(0.0);

    let raw = prev * (1.0 + spec.factor_scale * dev(f)) * gate * exam_gate;

    finish(
        ticker,
        Category::Stock,
        prev,
        raw,
        Some(ctx.cfg.alpha(spec.alpha)),
        ctx.cfg.clamp_pct(Category::Stock, spec.clamp_pct),
    )
}

// ---------------------------------------------------------------------------
// Tenth (bond-unit)
// ---------------------------------------------------------------------------

/// Weighted demand/quiz/urgency/inverse-participation move. No smoothing.
pub fn update_tenth(
    ctx: &PricingContext<'_>,
    ticker: &str,
    spec: &TenthSpec,
    prev: f64,
) -> Result<InstrumentUpdate, PricingError> {
    let gm = ctx.macro_factors.metrics.group_or_market(spec.group.as_deref());
    let urgency = ctx.macro_factors.urgency(spec.group.as_deref());
    let z_demand = norm_vs_media(
        ctx.input.demand.channel(&spec.demand_channel),
        ctx.cfg.medias.demand_baseline(&spec.demand_channel),
    );
    let w = &spec.weights;

    let mv = w.demand * dev(z_demand)
        + w.quiz * dev(gm.quiz)
        + w.urgency * dev(urgency)
        + w.inv_participation * dev(1.0 - gm.participation);
    let raw = prev * (1.0 + mv);

    finish(
        ticker,
        Category::Tenth,
        prev,
        raw,
        None,
        ctx.cfg.clamp_pct(Category::Tenth, spec.clamp_pct),
    )
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Follow `multiplier · max(source closes)`, floored, clamped around the
/// aggregate's own previous close.
///
/// `tenth_closes` must hold this run's already-updated tenth prices.
pub fn update_aggregate(
    cfg: &MarketConfig,
    spec: &AggregateSpec,
    prev: f64,
    tenth_closes: &BTreeMap<String, f64>,
) -> Result<InstrumentUpdate, PricingError> {
    let mut best = f64::NEG_INFINITY;
    for src in &spec.sources {
        let px = tenth_closes
            .get(src)
            .copied()
            .ok_or_else(|| PricingError::MissingSource {
                aggregate: spec.ticker.clone(),
                source: src.clone(),
            })?;
        best = best.max(px);
    }
    let raw = (spec.multiplier * best).max(spec.floor);

    finish(
        &spec.ticker,
        Category::Aggregate,
        prev,
        raw,
        None,
        cfg.clamp_pct(Category::Aggregate, spec.clamp_pct),
    )
}

// ---------------------------------------------------------------------------
// Consumable good
// ---------------------------------------------------------------------------

pub fn update_good(
    ctx: &PricingContext<'_>,
    ticker: &str,
    spec: &GoodSpec,
    prev: f64,
) -> Result<InstrumentUpdate, PricingError> {
    let mv: f64 = spec
        .weights
        .iter()
        .map(|(driver, w)| {
            let z = match driver {
                Driver::Metric(k) => ctx.macro_factors.metrics.get(*k),
                Driver::Demand(ch) => norm_vs_media(
                    ctx.input.demand.channel(ch),
                    ctx.cfg.medias.demand_baseline(ch),
                ),
            };
            w * dev(z)
        })
        .sum();
    let raw = prev * (1.0 + mv);

    finish(
        ticker,
        Category::Good,
        prev,
        raw,
        Some(ctx.cfg.alpha(spec.alpha)),
        ctx.cfg.clamp_pct(Category::Good, spec.clamp_pct),
    )
}
