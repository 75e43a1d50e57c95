//! Following one admitted run from the mission side

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::ticker::MissionLoopHandle;
use crate::coordinator::{Coordinator, CoordinatorMetrics, ExperimentState};
use crate::error::{CoordinatorError, CoordinatorResult};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Limits for [`follow_run`]
#[derive(Debug, Clone)]
pub struct FollowOptions {
    /// Mission ticks after which the run is aborted
    pub tick_budget: u64,

    /// Earlier abort point, if any
    pub abort_after_ticks: Option<u64>,

    /// How often the snapshot is polled
    pub poll_interval: Duration,
}

impl FollowOptions {
    pub fn new(tick_budget: u64, abort_after_ticks: Option<u64>) -> Self {
        Self {
            tick_budget,
            abort_after_ticks,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Tick count at which the run gets aborted
    pub fn abort_tick(&self) -> u64 {
        self.abort_after_ticks
            .map_or(self.tick_budget, |limit| limit.min(self.tick_budget))
    }
}

/// How the followed admission ended, read off the metric counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunEnd {
    Finished,
    Failed,
    Aborted,
    /// No experiment registered under the admitted code
    Dropped,
}

impl RunEnd {
    /// The end recorded between `before` and `now`, if any
    ///
    /// `before` must be taken before the code is admitted; every admission bumps
    /// exactly one of these counters once it is over.
    pub fn between(before: &CoordinatorMetrics, now: &CoordinatorMetrics) -> Option<Self> {
        if now.lookup_misses > before.lookup_misses {
            Some(Self::Dropped)
        } else if now.runs_aborted > before.runs_aborted {
            Some(Self::Aborted)
        } else if now.runs_failed > before.runs_failed {
            Some(Self::Failed)
        } else if now.runs_finished > before.runs_finished {
            Some(Self::Finished)
        } else {
            None
        }
    }
}

/// Final view of a followed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub end: RunEnd,
    pub state: ExperimentState,
    pub metrics: CoordinatorMetrics,
    /// Whether the tick budget ran out and an abort was sent
    #[serde(rename = "abort-sent")]
    pub abort_sent: bool,
}

/// Poll until the admission made after `baseline` has ended
///
/// Sends one abort once the mission loop reaches the abort tick. `on_progress`
/// sees the tick count and snapshot whenever the iteration counter moves.
pub async fn follow_run<F>(
    coordinator: &Coordinator,
    mission: &MissionLoopHandle,
    baseline: &CoordinatorMetrics,
    options: &FollowOptions,
    mut on_progress: F,
) -> CoordinatorResult<RunReport>
where
    F: FnMut(u64, &ExperimentState),
{
    debug!(?options, "follow_run: called");
    let handle = coordinator.handle();
    let abort_tick = options.abort_tick();
    let mut abort_sent = false;
    let mut last_counter = None;

    loop {
        tokio::time::sleep(options.poll_interval).await;

        let metrics = handle.metrics();
        if !handle.in_progress() {
            if let Some(end) = RunEnd::between(baseline, &metrics) {
                let state = handle.current_state().await?;
                info!(?end, iterations = state.iteration_counter, "Followed run ended");
                return Ok(RunReport {
                    end,
                    state,
                    metrics,
                    abort_sent,
                });
            }
        }
        if coordinator.is_worker_finished() {
            return Err(CoordinatorError::WorkerFailed(
                "worker exited before the run ended".to_string(),
            ));
        }

        let state = handle.current_state().await?;
        if state.current_experiment.is_some() && last_counter != Some(state.iteration_counter) {
            last_counter = Some(state.iteration_counter);
            on_progress(mission.tick_count(), &state);
        }

        let elapsed = mission.tick_count();
        if elapsed >= abort_tick && !abort_sent {
            warn!(elapsed, "Tick budget reached, aborting experiment");
            handle.abort_experiment();
            abort_sent = true;
        }
    }
}
