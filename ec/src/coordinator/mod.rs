//! Experiment execution coordinator
//!
//! Arbitrates the single experiment slot:
//! - **Admission:** `request_experiment` reserves a code, `start_experiment`
//!   hands it to the worker through a one-slot overwrite channel
//! - **Worker:** resolves the code and drives Start, Iteration*, Stop
//! - **Abort:** cooperative, observed only between iterations
//! - **Mission sync:** a run returning `WaitForNextCycle` parks until the next
//!   `notify_loop_iteration_start`
//! - **Snapshot:** lock-guarded state copied out for telemetry

mod admission;
mod config;
mod core;
mod handle;
mod metrics;
mod signals;
mod state;
mod worker;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use handle::CoordinatorHandle;
pub use metrics::{CoordinatorMetrics, RunOutcome};
pub use state::ExperimentState;
