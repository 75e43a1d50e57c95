//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Upper bound on waiting for the state lock, in milliseconds
    #[serde(rename = "lock-timeout-ms", default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    debug!("default_lock_timeout_ms: called");
    1000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl CoordinatorConfig {
    /// Get the lock timeout as a Duration
    pub fn lock_timeout(&self) -> Duration {
        debug!(lock_timeout_ms = %self.lock_timeout_ms, "CoordinatorConfig::lock_timeout: called");
        Duration::from_millis(self.lock_timeout_ms)
    }
}
