//! Command handler modules for the `clm` binary.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod report;
pub mod update;

use clm_runtime::{RunError, RunErrorKind};
use clm_store::StoreError;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_BAD_INPUT: u8 = 2;
pub const EXIT_STORAGE: u8 = 3;
pub const EXIT_BUSY: u8 = 4;

/// Process exit code for a failed command.
///
/// Bad input and computation faults share a code: in both cases nothing was
/// written and the operator has to fix the inputs or state before retrying.
pub fn exit_code(e: &anyhow::Error) -> u8 {
    if let Some(re) = e.downcast_ref::<RunError>() {
        return match re.kind() {
            RunErrorKind::BadInput | RunErrorKind::Compute => EXIT_BAD_INPUT,
            RunErrorKind::Storage => EXIT_STORAGE,
            RunErrorKind::Busy => EXIT_BUSY,
        };
    }
    if e.downcast_ref::<StoreError>().is_some() {
        return EXIT_STORAGE;
    }
    EXIT_FAILURE
}

/// `a,b,c` or `-` when empty.
pub fn join_or_dash<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        return "-".to_string();
    }
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clm_runtime::InputKind;

    #[test]
    fn run_errors_map_to_distinct_exit_codes() {
        let bad = anyhow::Error::new(RunError::BadInput {
            input: InputKind::Config,
            detail: "x".to_string(),
        });
        assert_eq!(exit_code(&bad), EXIT_BAD_INPUT);

        let busy = anyhow::Error::new(RunError::Busy {
            lock_path: "data/.clm-run.lock".into(),
            holder: "pid=1".to_string(),
        });
        assert_eq!(exit_code(&busy), EXIT_BUSY);

        let corrupt = anyhow::Error::new(StoreError::Corrupt {
            path: "data/history.json".into(),
            detail: "eof".to_string(),
        });
        assert_eq!(exit_code(&corrupt), EXIT_STORAGE);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), EXIT_FAILURE);
    }

    #[test]
    fn join_or_dash_handles_empty() {
        assert_eq!(join_or_dash::<String>(&[]), "-");
        assert_eq!(join_or_dash(&["a", "b"]), "a,b");
    }
}
