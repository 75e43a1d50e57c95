//! Coordinator error types

use std::time::Duration;

use thiserror::Error;

use crate::experiment::ExperimentCode;

/// Errors surfaced by the coordinator
///
/// Experiment failures are never reported here; they travel through
/// `StartResult`/`IterationResult` in the state snapshot.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("State lock not acquired within {timeout:?}")]
    LockTimeout { timeout: Duration },

    #[error("StartExperiment called with no requested experiment")]
    NoPendingRequest,

    #[error("Experiment code {0} is already registered")]
    DuplicateExperiment(ExperimentCode),

    #[error("Coordinator is shut down")]
    Closed,

    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoordinatorError::LockTimeout {
            timeout: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("250ms"));

        let err = CoordinatorError::DuplicateExperiment(ExperimentCode(7));
        assert_eq!(err.to_string(), "Experiment code 7 is already registered");

        assert!(CoordinatorError::NoPendingRequest.to_string().contains("no requested"));
    }
}
