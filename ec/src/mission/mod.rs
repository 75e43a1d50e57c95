//! Mission loop ticker
//!
//! Stands in for the spacecraft's outer control cycle: one
//! `notify_loop_iteration_start` per tick.

mod config;
mod follow;
mod ticker;

pub use config::MissionConfig;
pub use follow::{FollowOptions, RunEnd, RunReport, follow_run};
pub use ticker::{MissionLoop, MissionLoopHandle};
