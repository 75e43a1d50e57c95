//! Experiment state snapshot and the lock that guards it

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::experiment::{ExperimentCode, IterationResult, StartResult};

/// Point-in-time status of the coordinator, as seen by telemetry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentState {
    /// Code reserved by `request_experiment` and not yet started
    #[serde(rename = "requested-experiment")]
    pub requested_experiment: Option<ExperimentCode>,

    /// Code of the running experiment
    #[serde(rename = "current-experiment")]
    pub current_experiment: Option<ExperimentCode>,

    #[serde(rename = "last-start-result")]
    pub last_start_result: Option<StartResult>,

    #[serde(rename = "last-iteration-result")]
    pub last_iteration_result: Option<IterationResult>,

    /// Completed iterations in the current (or last) run
    #[serde(rename = "iteration-counter")]
    pub iteration_counter: u32,
}

/// Lock-guarded snapshot plus the `in_progress` flag
///
/// `in_progress` only changes while the lock is held, together with
/// `current_experiment`, so the two never disagree under the lock.
pub(crate) struct StateCell {
    inner: Mutex<ExperimentState>,
    in_progress: AtomicBool,
    timeout: Duration,
}

impl StateCell {
    pub(crate) fn new(timeout: Duration) -> Self {
        debug!(?timeout, "StateCell::new: called");
        Self {
            inner: Mutex::new(ExperimentState::default()),
            in_progress: AtomicBool::new(false),
            timeout,
        }
    }

    /// Acquire the state lock, failing loudly after the configured timeout
    pub(crate) async fn lock(&self) -> CoordinatorResult<MutexGuard<'_, ExperimentState>> {
        match tokio::time::timeout(self.timeout, self.inner.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                error!(timeout = ?self.timeout, "StateCell::lock: state lock acquisition timed out");
                Err(CoordinatorError::LockTimeout { timeout: self.timeout })
            }
        }
    }

    pub(crate) async fn snapshot(&self) -> CoordinatorResult<ExperimentState> {
        Ok(self.lock().await?.clone())
    }

    pub(crate) fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Mark a run as begun: reset the run fields and set `in_progress`
    pub(crate) async fn begin_run(&self, code: ExperimentCode) -> CoordinatorResult<()> {
        debug!(%code, "StateCell::begin_run: called");
        let mut state = self.lock().await?;
        state.current_experiment = Some(code);
        state.last_start_result = None;
        state.last_iteration_result = None;
        state.iteration_counter = 0;
        self.in_progress.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Mark the run as over; the result fields stay until the next run
    pub(crate) async fn end_run(&self) -> CoordinatorResult<()> {
        debug!("StateCell::end_run: called");
        let mut state = self.lock().await?;
        state.current_experiment = None;
        self.in_progress.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) async fn record_start(&self, result: StartResult) -> CoordinatorResult<()> {
        self.lock().await?.last_start_result = Some(result);
        Ok(())
    }

    pub(crate) async fn record_iteration(&self, result: IterationResult) -> CoordinatorResult<u32> {
        let mut state = self.lock().await?;
        state.last_iteration_result = Some(result);
        state.iteration_counter = state.iteration_counter.wrapping_add(1);
        Ok(state.iteration_counter)
    }
}
