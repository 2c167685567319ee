//! clm-pricing
//!
//! Deterministic daily price-update engine.
//!
//! Inputs: validated config, one day of activity metrics, previous closes.
//! Output: next closes plus a trace of how each was reached.
//!
//! It does **not**:
//! - read or write files (see `clm-store`)
//! - decide when a run happens or serialize runs (see `clm-runtime`)

pub mod macro_factors;
pub mod norm;
pub mod pipeline;
pub mod updaters;

use std::fmt;

pub use macro_factors::{compute_macro, compute_metrics, GroupMetrics, MacroFactors, MarketMetrics};
pub use norm::{clamp_move, ema, ex_from_days, norm_vs_media, NEUTRAL};
pub use pipeline::{prev_close, run_pipeline, PricingOutcome};
pub use updaters::{
    update_aggregate, update_currency, update_good, update_stock, update_tenth, InstrumentUpdate,
    PricingContext,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Computation faults. Any of these aborts the run before persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum PricingError {
    /// A stored previous close is not a positive finite number.
    BadPrevClose { ticker: String, value: f64 },
    /// An intermediate or final price came out NaN/infinite/non-positive.
    NonFinite {
        ticker: String,
        stage: &'static str,
        value: f64,
    },
    /// The aggregate names a tenth that was not priced in this run.
    MissingSource { aggregate: String, source: String },
}

impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingError::BadPrevClose { ticker, value } => {
                write!(f, "previous close of '{ticker}' is unusable: {value}")
            }
            PricingError::NonFinite {
                ticker,
                stage,
                value,
            } => {
                write!(f, "{stage} price of '{ticker}' is not a positive finite number: {value}")
            }
            PricingError::MissingSource { aggregate, source } => {
                write!(
                    f,
                    "aggregate '{aggregate}' follows '{source}' which was not priced this run"
                )
            }
        }
    }
}

impl std::error::Error for PricingError {}
