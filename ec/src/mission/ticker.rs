//! MissionLoop implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::config::MissionConfig;
use crate::coordinator::CoordinatorHandle;

/// Periodic mission cycle that signals the coordinator once per tick
pub struct MissionLoop {
    config: MissionConfig,
    coordinator: CoordinatorHandle,
    ticks: Arc<AtomicU64>,
}

impl MissionLoop {
    /// Create a new MissionLoop
    pub fn new(config: MissionConfig, coordinator: CoordinatorHandle) -> Self {
        Self {
            config,
            coordinator,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Perform a single tick, returning the tick count
    pub fn tick(&self) -> u64 {
        self.coordinator.notify_loop_iteration_start();
        let count = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(count, "MissionLoop::tick: called");
        count
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Tick every period until `stop` is notified or the tick limit is reached
    pub async fn run(self, stop: Arc<Notify>) -> u64 {
        let period = self.config.tick_period().max(Duration::from_millis(1));
        info!(?period, max_ticks = self.config.max_ticks, "MissionLoop started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let count = self.tick();
                    if self.config.tick_limit().is_some_and(|limit| count >= limit) {
                        info!(count, "MissionLoop reached tick limit");
                        break;
                    }
                }
                _ = stop.notified() => {
                    debug!("MissionLoop::run: stop requested");
                    break;
                }
            }
        }

        let count = self.tick_count();
        info!(count, "MissionLoop stopped");
        count
    }

    /// Run on a background task
    pub fn spawn(self) -> MissionLoopHandle {
        let stop = Arc::new(Notify::new());
        let ticks = Arc::clone(&self.ticks);
        let task = tokio::spawn(self.run(Arc::clone(&stop)));
        MissionLoopHandle { task, stop, ticks }
    }
}

/// Handle to a spawned [`MissionLoop`]
pub struct MissionLoopHandle {
    task: JoinHandle<u64>,
    stop: Arc<Notify>,
    ticks: Arc<AtomicU64>,
}

impl MissionLoopHandle {
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Whether the loop exited on its own (tick limit)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop ticking and return the final tick count
    pub async fn stop(self) -> u64 {
        self.stop.notify_one();
        match self.task.await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "MissionLoop task failed");
                self.ticks.load(Ordering::SeqCst)
            }
        }
    }
}
