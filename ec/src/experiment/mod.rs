//! Experiments and the registry the coordinator dispatches from

pub mod builtin;
mod registry;
mod types;

pub use registry::ExperimentRegistry;
pub use types::{Experiment, ExperimentCode, IterationResult, StartResult};
