//! ExperimentRegistry - the fixed set of experiments known to the coordinator

use tracing::debug;

use crate::error::{CoordinatorError, CoordinatorResult};

use super::types::{Experiment, ExperimentCode};

/// Registered experiment implementations, looked up by exact code match
///
/// Built once at boot and then handed to the coordinator, which owns it for
/// the lifetime of the worker. Codes are unique.
#[derive(Default)]
pub struct ExperimentRegistry {
    experiments: Vec<Box<dyn Experiment>>,
}

impl ExperimentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an experiment, rejecting a code that is already taken
    pub fn register(&mut self, experiment: Box<dyn Experiment>) -> CoordinatorResult<()> {
        let code = experiment.code();
        debug!(%code, name = experiment.name(), "ExperimentRegistry::register: called");
        if self.contains(code) {
            return Err(CoordinatorError::DuplicateExperiment(code));
        }
        self.experiments.push(experiment);
        Ok(())
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with(mut self, experiment: Box<dyn Experiment>) -> CoordinatorResult<Self> {
        self.register(experiment)?;
        Ok(self)
    }

    /// Whether an experiment with this code is registered
    pub fn contains(&self, code: ExperimentCode) -> bool {
        self.experiments.iter().any(|e| e.code() == code)
    }

    /// Look up an experiment for a run
    pub fn get_mut(&mut self, code: ExperimentCode) -> Option<&mut (dyn Experiment + 'static)> {
        self.experiments
            .iter_mut()
            .find(|e| e.code() == code)
            .map(|e| e.as_mut())
    }

    /// Registered codes with their names, in registration order
    pub fn entries(&self) -> Vec<(ExperimentCode, String)> {
        self.experiments
            .iter()
            .map(|e| (e.code(), e.name().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

impl std::fmt::Debug for ExperimentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentRegistry")
            .field("experiments", &self.entries())
            .finish()
    }
}
