//! Signal scorer - turns whale flow and momentum into a recommendation.
//!
//! The scorer looks at the three most recent whale alerts for a token, nets
//! buys against sells, adds the direction of the 24h price move and maps the
//! combined signal onto one of four fixed actions.

use crate::types::{TokenMarketState, TradeSide, WhaleAlert};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of most-recent whale alerts considered by the scorer.
pub const RECENT_WHALE_WINDOW: usize = 3;

/// Trading action suggested for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Hold,
    PartialSell,
    Sell,
}

impl Action {
    /// Map a combined signal onto an action.
    pub fn from_total_signal(total_signal: i32) -> Self {
        match total_signal {
            s if s >= 2 => Action::Buy,
            1 => Action::Hold,
            0 => Action::PartialSell,
            _ => Action::Sell,
        }
    }

    /// Fixed confidence (percent) attached to the action.
    pub fn confidence(&self) -> u8 {
        match self {
            Action::Buy => 85,
            Action::Hold => 70,
            Action::PartialSell => 65,
            Action::Sell => 80,
        }
    }

    /// Position split attached to the action.
    pub fn allocation(&self) -> Allocation {
        match self {
            Action::Buy | Action::Hold => Allocation { hold: 100, sell: 0 },
            Action::PartialSell => Allocation { hold: 70, sell: 30 },
            Action::Sell => Allocation { hold: 0, sell: 100 },
        }
    }

    /// Short explanation shown next to the action.
    pub fn rationale(&self) -> &'static str {
        match self {
            Action::Buy => "Strong whale accumulation\nPositive momentum\nHigh potential",
            Action::Hold => "Moderate whale activity\nStable price action\nAccumulation phase",
            Action::PartialSell => "Mixed market signals\nTake partial profits\nRisk management",
            Action::Sell => "Increasing sell pressure\nNegative momentum\nBetter opportunities ahead",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Hold => "HOLD",
            Action::PartialSell => "PARTIAL_SELL",
            Action::Sell => "SELL",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hold/sell split in percent. Always sums to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub hold: u8,
    pub sell: u8,
}

/// Recommendation derived from a token's market state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    /// Confidence in percent
    pub confidence: u8,
    pub rationale: String,
    pub allocation: Allocation,
}

impl Recommendation {
    /// Recommendation for a given action with its fixed confidence and split.
    pub fn for_action(action: Action) -> Self {
        Self {
            action,
            confidence: action.confidence(),
            rationale: action.rationale().to_string(),
            allocation: action.allocation(),
        }
    }

    /// Placeholder shown before the first evaluation of a token.
    pub fn pending() -> Self {
        Self {
            action: Action::Hold,
            confidence: 50,
            rationale: "Initializing analysis".to_string(),
            allocation: Allocation { hold: 100, sell: 0 },
        }
    }
}

/// Intermediate signal components, kept for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalScore {
    /// Recent buys minus recent sells
    pub whale_signal: i32,
    /// Sign of the 24h price change
    pub momentum: i32,
    pub total: i32,
}

impl SignalScore {
    pub fn compute(price_change_24h: f64, whale_alerts: &[WhaleAlert]) -> Self {
        let whale_signal = whale_signal(whale_alerts);
        let momentum = momentum(price_change_24h);
        Self {
            whale_signal,
            momentum,
            total: whale_signal + momentum,
        }
    }

    pub fn action(&self) -> Action {
        Action::from_total_signal(self.total)
    }

    pub fn recommend(&self) -> Recommendation {
        Recommendation::for_action(self.action())
    }
}

/// Net whale flow over the most recent alerts. Alerts must be newest first.
pub fn whale_signal(whale_alerts: &[WhaleAlert]) -> i32 {
    whale_alerts
        .iter()
        .take(RECENT_WHALE_WINDOW)
        .map(|alert| match alert.side {
            TradeSide::Buy => 1,
            TradeSide::Sell => -1,
        })
        .sum()
}

/// Direction of the 24h price change: +1, 0 or -1. NaN counts as flat.
pub fn momentum(price_change_24h: f64) -> i32 {
    if price_change_24h > 0.0 {
        1
    } else if price_change_24h < 0.0 {
        -1
    } else {
        0
    }
}

/// Score a token from its 24h change and whale alerts (newest first).
pub fn score(price_change_24h: f64, whale_alerts: &[WhaleAlert]) -> Recommendation {
    SignalScore::compute(price_change_24h, whale_alerts).recommend()
}

/// Score a token straight from its market record.
pub fn score_token(token: &TokenMarketState) -> Recommendation {
    score(token.price_change_24h, token.whale_alerts())
}
