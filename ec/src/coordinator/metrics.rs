//! Coordinator counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    Finished,
    StartFailed,
    IterationFailed,
    Aborted,
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorMetrics {
    #[serde(rename = "runs-started")]
    pub runs_started: u64,
    #[serde(rename = "runs-finished")]
    pub runs_finished: u64,
    /// Start or iteration failures
    #[serde(rename = "runs-failed")]
    pub runs_failed: u64,
    #[serde(rename = "runs-aborted")]
    pub runs_aborted: u64,
    /// Admitted codes with no registered experiment
    #[serde(rename = "lookup-misses")]
    pub lookup_misses: u64,
    /// Requests refused because a run was in progress
    #[serde(rename = "admissions-rejected")]
    pub admissions_rejected: u64,
    #[serde(rename = "total-iterations")]
    pub total_iterations: u64,
}

#[derive(Debug, Default)]
pub(crate) struct MetricCounters {
    runs_started: AtomicU64,
    runs_finished: AtomicU64,
    runs_failed: AtomicU64,
    runs_aborted: AtomicU64,
    lookup_misses: AtomicU64,
    admissions_rejected: AtomicU64,
    total_iterations: AtomicU64,
}

impl MetricCounters {
    pub(crate) fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn run_ended(&self, outcome: RunOutcome) {
        let counter = match outcome {
            RunOutcome::Finished => &self.runs_finished,
            RunOutcome::StartFailed | RunOutcome::IterationFailed => &self.runs_failed,
            RunOutcome::Aborted => &self.runs_aborted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn lookup_miss(&self) {
        self.lookup_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn admission_rejected(&self) {
        self.admissions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn iteration(&self) {
        self.total_iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CoordinatorMetrics {
        CoordinatorMetrics {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_finished: self.runs_finished.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_aborted: self.runs_aborted.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
            admissions_rejected: self.admissions_rejected.load(Ordering::Relaxed),
            total_iterations: self.total_iterations.load(Ordering::Relaxed),
        }
    }
}
