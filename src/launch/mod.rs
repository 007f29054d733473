//! Upcoming launch tracking: feed, local store and the polling service.

pub mod source;
pub mod storage;
pub mod tracker;
pub mod types;

pub use source::{HttpSourceConfig, LaunchSource, PumpFunLaunchSource};
pub use storage::{LaunchStorage, SqliteLaunchStore};
pub use tracker::{LaunchTracker, LaunchTrackerBuilder, LaunchTrackerConfig};
pub use types::{parse_launch_payload, SocialMetrics, TokenLaunch, HIGH_POTENTIAL_SCORE};
