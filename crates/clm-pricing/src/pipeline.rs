//! Ordered daily pricing pipeline.
//!
//! Fixed order: currencies, stocks, tenths, aggregate, goods. The aggregate
//! is handed the tenth closes produced earlier in the same run; it never
//! reads them from the previous state.

use std::collections::BTreeMap;

use clm_config::MarketConfig;
use clm_schemas::{DailyInput, MarketState};

use crate::macro_factors::{compute_macro, MacroFactors};
use crate::updaters::{
    update_aggregate, update_currency, update_good, update_stock, update_tenth, InstrumentUpdate,
    PricingContext,
};
use crate::PricingError;

/// Result of one pricing run. Nothing here has been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingOutcome {
    /// New close for every configured instrument.
    pub closes: BTreeMap<String, f64>,
    /// Per-instrument trace in evaluation order.
    pub updates: Vec<InstrumentUpdate>,
    pub macro_factors: MacroFactors,
}

/// Previous close of `ticker`, or `base_price` on first sight.
pub fn prev_close(state: &MarketState, ticker: &str, base_price: f64) -> Result<f64, PricingError> {
    match state.close(ticker) {
        None => Ok(base_price),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(PricingError::BadPrevClose {
            ticker: ticker.to_string(),
            value: v,
        }),
    }
}

/// Compute the next close of every configured instrument.
pub fn run_pipeline(
    cfg: &MarketConfig,
    input: &DailyInput,
    prev: &MarketState,
) -> Result<PricingOutcome, PricingError> {
    let macro_factors = compute_macro(cfg, input);
    let ctx = PricingContext {
        cfg,
        input,
        macro_factors: &macro_factors,
    };
    let ins = &cfg.instruments;
    let mut updates: Vec<InstrumentUpdate> = Vec::new();

    for (t, spec) in &ins.currencies {
        let p = prev_close(prev, t, spec.base_price)?;
        updates.push(update_currency(&ctx, t, spec, p)?);
    }

    for (t, spec) in &ins.stocks {
        let p = prev_close(prev, t, spec.base_price)?;
        updates.push(update_stock(&ctx, t, spec, p)?);
    }

    let mut tenth_closes: BTreeMap<String, f64> = BTreeMap::new();
    for (t, spec) in &ins.tenths {
        let p = prev_close(prev, t, spec.base_price)?;
        let u = update_tenth(&ctx, t, spec, p)?;
        tenth_closes.insert(t.clone(), u.close);
        updates.push(u);
    }

    if let Some(spec) = &ins.aggregate {
        let p = prev_close(prev, &spec.ticker, spec.base_price)?;
        updates.push(update_aggregate(cfg, spec, p, &tenth_closes)?);
    }

    for (t, spec) in &ins.goods {
        let p = prev_close(prev, t, spec.base_price)?;
        updates.push(update_good(&ctx, t, spec, p)?);
    }

    let closes = updates
        .iter()
        .map(|u| (u.ticker.clone(), u.close))
        .collect();

    Ok(PricingOutcome {
        closes,
        updates,
        macro_factors,
    })
}
