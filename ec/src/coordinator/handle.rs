//! CoordinatorHandle - the interface command handlers and the mission loop use

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::experiment::ExperimentCode;

use super::core::Shared;
use super::metrics::CoordinatorMetrics;
use super::state::ExperimentState;

/// Handle to the experiment coordinator
///
/// Cheap to clone. Nothing here blocks beyond the bounded state lock.
#[derive(Clone)]
pub struct CoordinatorHandle {
    shared: Arc<Shared>,
}

impl CoordinatorHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Reserve `code` as the next experiment to run
    ///
    /// Returns `false` without touching state while a run is in progress.
    /// A later request before `start_experiment` overwrites this one.
    pub async fn request_experiment(&self, code: ExperimentCode) -> CoordinatorResult<bool> {
        debug!(%code, "CoordinatorHandle::request_experiment: called");
        let mut state = self.shared.state.lock().await?;
        if self.shared.state.in_progress() {
            info!(%code, current = ?state.current_experiment, "Experiment request rejected, run in progress");
            self.shared.metrics.admission_rejected();
            return Ok(false);
        }

        if let Some(previous) = state.requested_experiment {
            debug!(%previous, %code, "CoordinatorHandle::request_experiment: overwriting pending request");
        }
        state.requested_experiment = Some(code);
        Ok(true)
    }

    /// Commit the requested experiment to the worker
    ///
    /// Errors with [`CoordinatorError::NoPendingRequest`] if nothing was requested.
    pub async fn start_experiment(&self) -> CoordinatorResult<()> {
        debug!("CoordinatorHandle::start_experiment: called");
        let mut state = self.shared.state.lock().await?;
        let code = state.requested_experiment.ok_or(CoordinatorError::NoPendingRequest)?;
        // the reservation survives a closed channel
        self.shared.admission.push(code)?;
        state.requested_experiment = None;
        info!(%code, "Experiment admitted");
        Ok(())
    }

    /// Ask the running experiment to stop at its next checkpoint
    pub fn abort_experiment(&self) {
        info!("Experiment abort requested");
        self.shared.signals.request_abort();
    }

    /// Whether an experiment run is active
    pub fn in_progress(&self) -> bool {
        self.shared.state.in_progress()
    }

    /// Whether a code is reserved and waiting for `start_experiment`
    pub async fn is_experiment_requested(&self) -> CoordinatorResult<bool> {
        debug!("CoordinatorHandle::is_experiment_requested: called");
        Ok(self.shared.state.lock().await?.requested_experiment.is_some())
    }

    /// Mission loop tick; wakes a run parked on `WaitForNextCycle`, otherwise a no-op
    pub fn notify_loop_iteration_start(&self) {
        let woke = self.shared.signals.notify_cycle();
        debug!(woke, "CoordinatorHandle::notify_loop_iteration_start: called");
    }

    /// Copy of the current state snapshot
    pub async fn current_state(&self) -> CoordinatorResult<ExperimentState> {
        debug!("CoordinatorHandle::current_state: called");
        self.shared.state.snapshot().await
    }

    /// Current coordinator counters
    pub fn metrics(&self) -> CoordinatorMetrics {
        self.shared.metrics.snapshot()
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("in_progress", &self.in_progress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorConfig;

    fn handle() -> CoordinatorHandle {
        let (shared, _receiver) = Shared::new(&CoordinatorConfig::default());
        CoordinatorHandle::new(Arc::new(shared))
    }

    #[tokio::test]
    async fn test_request_overwrites_pending() {
        let handle = handle();
        assert!(handle.request_experiment(ExperimentCode(3)).await.unwrap());
        assert!(handle.request_experiment(ExperimentCode(8)).await.unwrap());

        let state = handle.current_state().await.unwrap();
        assert_eq!(state.requested_experiment, Some(ExperimentCode(8)));
        assert!(handle.is_experiment_requested().await.unwrap());
    }

    #[tokio::test]
    async fn test_request_rejected_while_in_progress() {
        let handle = handle();
        assert!(handle.request_experiment(ExperimentCode(2)).await.unwrap());
        handle.shared.state.begin_run(ExperimentCode(1)).await.unwrap();

        assert!(!handle.request_experiment(ExperimentCode(9)).await.unwrap());
        let state = handle.current_state().await.unwrap();
        assert_eq!(state.requested_experiment, Some(ExperimentCode(2)));
        assert_eq!(handle.metrics().admissions_rejected, 1);
    }

    #[tokio::test]
    async fn test_start_without_request_is_an_error() {
        let handle = handle();
        let err = handle.start_experiment().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::NoPendingRequest));
    }

    #[tokio::test]
    async fn test_start_clears_request() {
        let handle = handle();
        handle.request_experiment(ExperimentCode(4)).await.unwrap();
        handle.start_experiment().await.unwrap();

        assert!(!handle.is_experiment_requested().await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_timeout_surfaces_from_api() {
        let (shared, _receiver) = Shared::new(&CoordinatorConfig { lock_timeout_ms: 20 });
        let handle = CoordinatorHandle::new(Arc::new(shared));

        let _held = handle.shared.state.lock().await.unwrap();
        assert!(matches!(
            handle.request_experiment(ExperimentCode(1)).await,
            Err(CoordinatorError::LockTimeout { .. })
        ));
        assert!(handle.current_state().await.is_err());
    }
}
