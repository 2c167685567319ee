//! clm-runtime
//!
//! One daily market update, end to end: load config and the day's input,
//! price every instrument, persist state and history together.
//!
//! Runs are serialized per data directory by a lock file. A run either
//! commits both records or leaves both as they were.
//!
//! It does **not**:
//! - schedule runs (an external job calls `clm update` once a day)
//! - produce the daily input (it is collected upstream)
//! - serve prices over any network surface

pub mod error;
pub mod orchestrator;
pub mod reports;

pub use error::{InputKind, RunError, RunErrorKind};
pub use orchestrator::{
    compute_next_state, derive_run_id, load_daily_input, pricing_basis, run_daily_update, NextState,
    RunReport, RunRequest,
};
pub use reports::{movers, quotes, Mover, MoversReport, Quote};
