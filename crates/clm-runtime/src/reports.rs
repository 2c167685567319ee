//! Read-only views over state and history.

use chrono::NaiveDate;
use clm_config::{Category, MarketConfig};
use clm_schemas::{HistoryEntry, MarketState};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mover {
    pub ticker: String,
    pub from: f64,
    pub to: f64,
    /// Percentage change, e.g. `2.5` for +2.5%.
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoversReport {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub movers: Vec<Mover>,
}

/// Largest day-over-day moves between the last two history entries.
///
/// `None` with fewer than two entries. Tickers missing from either day or
/// with a non-positive earlier close are skipped.
pub fn movers(history: &[HistoryEntry], n: usize) -> Option<MoversReport> {
    let [.., prev, last] = history else {
        return None;
    };

    let mut out: Vec<Mover> = last
        .closes
        .iter()
        .filter_map(|(t, &to)| {
            let from = *prev.closes.get(t)?;
            (from > 0.0).then(|| Mover {
                ticker: t.clone(),
                from,
                to,
                pct: (to / from - 1.0) * 100.0,
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.pct
            .abs()
            .total_cmp(&a.pct.abs())
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    out.truncate(n);

    Some(MoversReport {
        from_date: prev.date,
        to_date: last.date,
        movers: out,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub ticker: String,
    pub category: Category,
    pub base_price: f64,
    pub last: f64,
    /// False when the state has no close yet and `last` is the base price.
    pub has_close: bool,
    pub pct_vs_base: f64,
}

/// Every configured instrument, in pipeline order.
pub fn quotes(cfg: &MarketConfig, state: &MarketState) -> Vec<Quote> {
    cfg.instruments()
        .into_iter()
        .map(|i| {
            let close = state.close(i.ticker);
            let last = close.unwrap_or(i.base_price);
            Quote {
                ticker: i.ticker.to_string(),
                category: i.category,
                base_price: i.base_price,
                last,
                has_close: close.is_some(),
                pct_vs_base: (last / i.base_price - 1.0) * 100.0,
            }
        })
        .collect()
}
