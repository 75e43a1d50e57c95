//! Experiment contract and result types

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Numeric identifier of a registered experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentCode(pub u8);

impl fmt::Display for ExperimentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ExperimentCode {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

impl FromStr for ExperimentCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map(Self)
            .map_err(|e| format!("Invalid experiment code '{}': {}", s, e))
    }
}

/// Outcome of `Experiment::start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartResult {
    Success,
    Failure,
}

/// Outcome of a single `Experiment::iteration` call
///
/// Drives the run loop: `Finished` and `Failure` are terminal, `WaitForNextCycle`
/// parks the run until the next mission loop tick, the rest loop straight back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IterationResult {
    None,
    Finished,
    LoopImmediately,
    WaitForNextCycle,
    Failure,
}

impl IterationResult {
    /// Whether this result ends the run
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failure)
    }
}

/// An onboard experiment driven by the coordinator
///
/// Implementations are registered once at boot and live for the whole process.
/// All callbacks run on the coordinator's worker task, one run at a time.
#[async_trait]
pub trait Experiment: Send {
    /// Code this experiment is registered under
    fn code(&self) -> ExperimentCode;

    /// Human-readable name, used in logs
    fn name(&self) -> &str {
        "experiment"
    }

    /// Acquire resources and prepare the run
    async fn start(&mut self) -> StartResult;

    /// Perform one unit of work
    async fn iteration(&mut self) -> IterationResult;

    /// Release resources; always called once per run, even after a failed start
    async fn stop(&mut self, result: IterationResult);
}
