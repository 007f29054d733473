//! Mock market: seed tokens and the tick-driven simulator.

pub mod seed;
pub mod simulator;

pub use seed::default_market;
pub use simulator::{MarketSimulator, MarketState, SimulatorConfig, SimulatorStats};
