//! Upcoming token launch records and payload parsing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Potential score at or above which a launch counts as high potential.
pub const HIGH_POTENTIAL_SCORE: f64 = 70.0;

/// Community size reported for a launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMetrics {
    #[serde(default)]
    pub telegram: u64,
    #[serde(default)]
    pub twitter: u64,
}

/// An announced token launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenLaunch {
    pub name: String,
    pub symbol: String,
    pub launch_time: DateTime<Utc>,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub initial_market_cap: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub social_metrics: SocialMetrics,
    #[serde(default)]
    pub audit_status: bool,
    #[serde(default)]
    pub kyc_status: bool,
    /// 0-100, higher is better. Missing scores count as 0.
    #[serde(default)]
    pub potential_score: f64,
}

impl TokenLaunch {
    pub fn is_high_potential(&self, min_score: f64) -> bool {
        self.potential_score >= min_score
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LaunchPayload {
    List(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

/// Parse a launch feed body. Accepts a bare array or `{ "data": [...] }`.
/// Entries that do not describe a launch are skipped.
pub fn parse_launch_payload(body: &str) -> Result<Vec<TokenLaunch>> {
    let payload: LaunchPayload =
        serde_json::from_str(body).context("Launch payload is neither a list nor a data envelope")?;

    let entries = match payload {
        LaunchPayload::List(entries) => entries,
        LaunchPayload::Wrapped { data } => data,
    };

    let launches = entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value::<TokenLaunch>(entry) {
            Ok(launch) => Some(launch),
            Err(e) => {
                warn!("Skipping malformed launch entry {}: {}", i, e);
                None
            }
        })
        .collect();

    Ok(launches)
}

/// Keep only launches scoring at least `min_score`, preserving order.
pub fn filter_high_potential(launches: Vec<TokenLaunch>, min_score: f64) -> Vec<TokenLaunch> {
    launches
        .into_iter()
        .filter(|l| l.is_high_potential(min_score))
        .collect()
}
