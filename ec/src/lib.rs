//! expcoord - Experiment Execution Coordinator
//!
//! Arbitrates a spacecraft's shared experimentation resource: exactly one
//! onboard experiment runs at a time, and the coordinator decides which one,
//! when it starts, how it advances and how it is stopped.
//!
//! # Core Concepts
//!
//! - **Two-phase admission**: request reserves a code, start commits it
//! - **One worker**: a background task runs Start, Iteration*, Stop
//! - **Cooperative abort**: checked only between iterations
//! - **Mission pacing**: experiments can wait for the next mission loop tick
//!
//! # Modules
//!
//! - [`coordinator`] - Admission, worker, run loop and state snapshot
//! - [`experiment`] - Experiment contract, registry and sample experiments
//! - [`mission`] - Periodic mission loop ticker
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod experiment;
pub mod mission;

// Re-export commonly used types
pub use config::{Config, ExperimentDef};
pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorHandle, CoordinatorMetrics, ExperimentState, RunOutcome,
};
pub use error::{CoordinatorError, CoordinatorResult};
pub use experiment::{Experiment, ExperimentCode, ExperimentRegistry, IterationResult, StartResult};
pub use mission::{FollowOptions, MissionConfig, MissionLoop, MissionLoopHandle, RunEnd, RunReport, follow_run};
