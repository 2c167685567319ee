use std::fmt;
use std::path::PathBuf;

use clm_pricing::PricingError;
use clm_store::StoreError;

/// Which input failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Config,
    DailyInput,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Config => "config",
            InputKind::DailyInput => "daily_input",
        }
    }
}

/// Coarse classification for callers that only need to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    BadInput,
    Compute,
    Storage,
    Busy,
}

impl RunErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunErrorKind::BadInput => "bad_input",
            RunErrorKind::Compute => "compute",
            RunErrorKind::Storage => "storage",
            RunErrorKind::Busy => "busy",
        }
    }
}

/// Failure of a daily run. No variant is returned after a partial write.
#[derive(Debug)]
pub enum RunError {
    BadInput { input: InputKind, detail: String },
    Compute(PricingError),
    Storage(StoreError),
    Busy { lock_path: PathBuf, holder: String },
}

impl RunError {
    pub fn kind(&self) -> RunErrorKind {
        match self {
            RunError::BadInput { .. } => RunErrorKind::BadInput,
            RunError::Compute(_) => RunErrorKind::Compute,
            RunError::Storage(_) => RunErrorKind::Storage,
            RunError::Busy { .. } => RunErrorKind::Busy,
        }
    }

    pub(crate) fn bad_input(input: InputKind, err: &anyhow::Error) -> Self {
        RunError::BadInput {
            input,
            detail: format!("{err:#}"),
        }
    }
}

impl From<PricingError> for RunError {
    fn from(e: PricingError) -> Self {
        RunError::Compute(e)
    }
}

impl From<StoreError> for RunError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Locked { path, holder } => RunError::Busy {
                lock_path: path,
                holder,
            },
            other => RunError::Storage(other),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::BadInput { input, detail } => {
                write!(f, "bad input ({}): {detail}", input.as_str())
            }
            RunError::Compute(_) => f.write_str("computation failed"),
            RunError::Storage(_) => f.write_str("storage failure"),
            RunError::Busy { lock_path, holder } => {
                write!(
                    f,
                    "another run is in progress (lock {} held by {holder})",
                    lock_path.display()
                )
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Compute(e) => Some(e),
            RunError::Storage(e) => Some(e),
            _ => None,
        }
    }
}
