//! Xelion - simulated Solana meme-coin market with whale-driven trade signals.
//!
//! The crate is built from a few explicitly started services that talk over
//! [`events::EventBus`]es:
//! - [`market::MarketSimulator`] perturbs a fixed token set on a timer;
//! - [`signal::SignalAdvisor`] scores every token on change and on its own refresh;
//! - [`alerts::PriceAlertMonitor`] checks user price alerts;
//! - [`launch::LaunchTracker`] polls a launch feed for high-potential tokens.

pub mod alerts;
pub mod config;
pub mod display;
pub mod events;
pub mod launch;
pub mod market;
pub mod signal;
pub mod types;

// Re-export main types for convenience
pub use config::{ConfigBuilder, XelionConfig};
pub use events::{EventBus, Subscription};
pub use market::{MarketSimulator, SimulatorConfig};
pub use signal::{score, Action, Recommendation, SignalAdvisor};
pub use types::{MarketSnapshot, TokenMarketState, TradeSide, WhaleAlert};
