//! Background worker: dispatch loop and per-experiment run loop

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::CoordinatorResult;
use crate::experiment::{Experiment, ExperimentCode, ExperimentRegistry, IterationResult, StartResult};

use super::admission::AdmissionReceiver;
use super::core::Shared;
use super::metrics::RunOutcome;

/// The single task that runs experiments
///
/// Idle while waiting on the admission channel; one admitted code at a time is
/// resolved against the registry and driven through Start, Iteration* and Stop.
pub(crate) struct Worker {
    shared: Arc<Shared>,
    registry: ExperimentRegistry,
    admission: AdmissionReceiver,
}

impl Worker {
    pub(crate) fn new(shared: Arc<Shared>, registry: ExperimentRegistry, admission: AdmissionReceiver) -> Self {
        Self {
            shared,
            registry,
            admission,
        }
    }

    /// Run until the admission channel closes
    ///
    /// A state lock timeout is fatal: the worker logs it and exits with the error.
    pub(crate) async fn run(mut self) -> CoordinatorResult<()> {
        info!(experiments = self.registry.len(), "Experiment worker started");

        while let Some(code) = self.admission.pop().await {
            if let Err(e) = self.dispatch(code).await {
                error!(%code, error = %e, "Experiment worker failed");
                return Err(e);
            }
        }

        info!("Experiment worker stopped");
        Ok(())
    }

    async fn dispatch(&mut self, code: ExperimentCode) -> CoordinatorResult<()> {
        debug!(%code, "Worker::dispatch: called");
        let shared = &self.shared;

        let Some(experiment) = self.registry.get_mut(code) else {
            warn!(%code, "No experiment registered for admitted code, dropping");
            shared.metrics.lookup_miss();
            return Ok(());
        };

        // a stale abort from an earlier run must not cancel this one
        shared.signals.clear_abort();
        shared.state.begin_run(code).await?;
        shared.metrics.run_started();
        info!(%code, name = experiment.name(), "Experiment run started");

        let outcome = run_experiment(shared, experiment).await;
        let ended = shared.state.end_run().await;
        let outcome = outcome?;
        ended?;

        shared.metrics.run_ended(outcome);
        info!(%code, ?outcome, "Experiment run ended");
        Ok(())
    }
}

/// Start, iterate and stop one experiment; `stop` is called on every path
async fn run_experiment(shared: &Shared, experiment: &mut dyn Experiment) -> CoordinatorResult<RunOutcome> {
    let start = experiment.start().await;
    debug!(?start, "run_experiment: start returned");

    let terminal = match shared.state.record_start(start).await {
        Err(e) => Err(e),
        Ok(()) if start == StartResult::Failure => {
            warn!(code = %experiment.code(), "Experiment failed to start");
            Ok((IterationResult::Failure, RunOutcome::StartFailed))
        }
        Ok(()) => iterate(shared, experiment).await,
    };

    let final_result = terminal
        .as_ref()
        .map(|(result, _)| *result)
        .unwrap_or(IterationResult::Failure);
    experiment.stop(final_result).await;
    debug!(?final_result, "run_experiment: stop returned");

    terminal.map(|(_, outcome)| outcome)
}

/// Iterate until a terminal result or an abort observed at a checkpoint
async fn iterate(
    shared: &Shared,
    experiment: &mut dyn Experiment,
) -> CoordinatorResult<(IterationResult, RunOutcome)> {
    loop {
        if shared.signals.take_abort() || shared.signals.is_closed() {
            info!(code = %experiment.code(), "Abort observed, stopping run");
            return Ok((IterationResult::Failure, RunOutcome::Aborted));
        }
        shared.signals.clear_cycle_started();

        let result = experiment.iteration().await;
        let count = shared.state.record_iteration(result).await?;
        shared.metrics.iteration();
        debug!(?result, count, "iterate: iteration complete");

        if result.is_terminal() {
            if result == IterationResult::Failure {
                warn!(code = %experiment.code(), count, "Experiment iteration failed");
                return Ok((result, RunOutcome::IterationFailed));
            }
            return Ok((result, RunOutcome::Finished));
        }

        if result == IterationResult::WaitForNextCycle {
            let wake = shared.signals.wait_for_cycle_or_abort().await;
            debug!(?wake, "iterate: resumed");
        } else {
            // let other tasks on this runtime thread in between iterations
            tokio::task::yield_now().await;
        }
    }
}
