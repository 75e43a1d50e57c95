//! Coordinator context and worker lifecycle

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::experiment::ExperimentRegistry;

use super::admission::{self, AdmissionReceiver, AdmissionSender};
use super::config::CoordinatorConfig;
use super::handle::CoordinatorHandle;
use super::metrics::MetricCounters;
use super::signals::RunSignals;
use super::state::StateCell;

/// Everything the API side and the worker share
pub(crate) struct Shared {
    pub(crate) state: StateCell,
    pub(crate) admission: AdmissionSender,
    pub(crate) signals: RunSignals,
    pub(crate) metrics: MetricCounters,
}

impl Shared {
    pub(crate) fn new(config: &CoordinatorConfig) -> (Self, AdmissionReceiver) {
        let (admission, receiver) = admission::channel();
        let shared = Self {
            state: StateCell::new(config.lock_timeout()),
            admission,
            signals: RunSignals::new(),
            metrics: MetricCounters::default(),
        };
        (shared, receiver)
    }
}

/// Owns the experiment worker task
///
/// Hand out [`CoordinatorHandle`]s to command handlers, the mission loop and
/// telemetry; keep the `Coordinator` itself where the process shuts down.
pub struct Coordinator {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<CoordinatorResult<()>>>,
}

impl Coordinator {
    /// Take ownership of the registry and spawn the worker
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(registry: ExperimentRegistry, config: CoordinatorConfig) -> Self {
        debug!(?config, ?registry, "Coordinator::spawn: called");
        let (shared, receiver) = Shared::new(&config);
        let shared = Arc::new(shared);

        let worker = super::worker::Worker::new(Arc::clone(&shared), registry, receiver);
        let worker = tokio::spawn(worker.run());

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Create a cloneable handle to the coordinator
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(Arc::clone(&self.shared))
    }

    /// Whether the worker task has exited (after shutdown or a fatal error)
    pub fn is_worker_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|w| w.is_finished())
    }

    /// Stop accepting experiments, abort any run at its next checkpoint and
    /// wait for the worker to exit
    pub async fn shutdown(mut self) -> CoordinatorResult<()> {
        info!("Coordinator shutting down");
        self.close();

        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let result = match worker.await {
            Ok(result) => result,
            Err(e) => Err(CoordinatorError::WorkerFailed(e.to_string())),
        };

        info!("Coordinator stopped");
        result
    }

    fn close(&self) {
        self.shared.admission.close();
        self.shared.signals.close();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!("Coordinator::drop: closing without join");
            self.close();
        }
    }
}
