//! Builtin sample experiments
//!
//! `Countdown` is what the simulator registers from config; `Scripted` replays a
//! fixed sequence of results and records what the coordinator did with it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::types::{Experiment, ExperimentCode, IterationResult, StartResult};

/// Runs a fixed number of iterations, optionally pacing them to mission ticks
#[derive(Debug, Clone)]
pub struct Countdown {
    code: ExperimentCode,
    name: String,
    iterations: u32,
    wait_for_cycle: bool,
    fail_start: bool,
    fail_at: Option<u32>,
    remaining: u32,
}

impl Countdown {
    pub fn new(code: u8, name: impl Into<String>, iterations: u32) -> Self {
        Self {
            code: ExperimentCode::from(code),
            name: name.into(),
            iterations,
            wait_for_cycle: false,
            fail_start: false,
            fail_at: None,
            remaining: iterations,
        }
    }

    /// Yield to the next mission tick between iterations
    pub fn wait_for_cycle(mut self, wait: bool) -> Self {
        self.wait_for_cycle = wait;
        self
    }

    /// Make `start` report failure
    pub fn fail_start(mut self, fail: bool) -> Self {
        self.fail_start = fail;
        self
    }

    /// Make the given (1-based) iteration report failure
    pub fn fail_at(mut self, iteration: Option<u32>) -> Self {
        self.fail_at = iteration;
        self
    }
}

#[async_trait]
impl Experiment for Countdown {
    fn code(&self) -> ExperimentCode {
        self.code
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> StartResult {
        debug!(code = %self.code, name = %self.name, "Countdown::start: called");
        self.remaining = self.iterations;
        if self.fail_start {
            return StartResult::Failure;
        }
        StartResult::Success
    }

    async fn iteration(&mut self) -> IterationResult {
        let current = self.iterations - self.remaining + 1;
        debug!(code = %self.code, current, remaining = self.remaining, "Countdown::iteration: called");
        if self.fail_at == Some(current) {
            return IterationResult::Failure;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            IterationResult::Finished
        } else if self.wait_for_cycle {
            IterationResult::WaitForNextCycle
        } else {
            IterationResult::LoopImmediately
        }
    }

    async fn stop(&mut self, result: IterationResult) {
        info!(code = %self.code, name = %self.name, ?result, "Countdown stopped");
    }
}

/// Shared view of what happened to a [`Scripted`] experiment
#[derive(Debug, Default)]
pub struct ScriptTrace {
    starts: AtomicU32,
    iterations: AtomicU32,
    stops: Mutex<Vec<IterationResult>>,
}

impl ScriptTrace {
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations.load(Ordering::SeqCst)
    }

    /// Results passed to `stop`, one entry per finished run
    pub fn stops(&self) -> Vec<IterationResult> {
        self.stops.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Replays a scripted sequence of iteration results
///
/// Once the script is exhausted every further iteration returns `Finished`.
/// The script restarts from the top on every run.
#[derive(Debug)]
pub struct Scripted {
    code: ExperimentCode,
    start_result: StartResult,
    script: Vec<IterationResult>,
    pending: VecDeque<IterationResult>,
    iteration_delay: Option<Duration>,
    trace: Arc<ScriptTrace>,
}

impl Scripted {
    pub fn new(code: u8, script: Vec<IterationResult>) -> Self {
        Self {
            code: ExperimentCode::from(code),
            start_result: StartResult::Success,
            pending: script.iter().copied().collect(),
            script,
            iteration_delay: None,
            trace: Arc::new(ScriptTrace::default()),
        }
    }

    /// Result `start` will report
    pub fn with_start(mut self, result: StartResult) -> Self {
        self.start_result = result;
        self
    }

    /// Sleep inside every iteration
    pub fn with_iteration_delay(mut self, delay: Duration) -> Self {
        self.iteration_delay = Some(delay);
        self
    }

    /// Handle for observing starts, iterations and stops from outside the worker
    pub fn trace(&self) -> Arc<ScriptTrace> {
        Arc::clone(&self.trace)
    }
}

#[async_trait]
impl Experiment for Scripted {
    fn code(&self) -> ExperimentCode {
        self.code
    }

    fn name(&self) -> &str {
        "scripted"
    }

    async fn start(&mut self) -> StartResult {
        self.trace.starts.fetch_add(1, Ordering::SeqCst);
        self.pending = self.script.iter().copied().collect();
        self.start_result
    }

    async fn iteration(&mut self) -> IterationResult {
        match self.iteration_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.trace.iterations.fetch_add(1, Ordering::SeqCst);
        self.pending.pop_front().unwrap_or(IterationResult::Finished)
    }

    async fn stop(&mut self, result: IterationResult) {
        if let Ok(mut stops) = self.trace.stops.lock() {
            stops.push(result);
        }
    }
}
