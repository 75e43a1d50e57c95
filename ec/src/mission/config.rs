//! Mission loop configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the MissionLoop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionConfig {
    /// Tick period in milliseconds
    #[serde(rename = "tick-ms", default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Stop after this many ticks (0 = run until stopped)
    #[serde(rename = "max-ticks", default)]
    pub max_ticks: u64,
}

fn default_tick_ms() -> u64 {
    1000
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            max_ticks: 0,
        }
    }
}

impl MissionConfig {
    /// Get the tick period as a Duration
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Tick limit, if any
    pub fn tick_limit(&self) -> Option<u64> {
        (self.max_ticks > 0).then_some(self.max_ticks)
    }
}
