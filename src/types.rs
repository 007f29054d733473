//! Core types and data structures for the Xelion market core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of whale alerts retained per token.
pub const WHALE_ALERT_CAPACITY: usize = 5;

/// Direction of a whale transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

/// A single large on-chain transfer observed for a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleAlert {
    /// Wallet address that moved the funds
    pub address: String,
    /// Size of the transfer in quote currency
    pub amount: f64,
    /// Whether the whale bought or sold
    pub side: TradeSide,
    /// When the transfer happened
    pub timestamp: DateTime<Utc>,
}

/// Market state of one tracked token.
///
/// Whale alerts are ordered most-recent-first and never exceed
/// [`WHALE_ALERT_CAPACITY`] entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMarketState {
    /// Display name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Current price in quote currency
    pub price: f64,
    /// 24h price change in percent
    pub price_change_24h: f64,
    /// 24h traded volume
    pub volume_24h: f64,
    /// Market capitalization
    pub market_cap: f64,
    /// Recent whale alerts, newest first
    #[serde(deserialize_with = "deserialize_whale_alerts")]
    whale_alerts: Vec<WhaleAlert>,
    /// Last time this record was updated
    pub updated_at: DateTime<Utc>,
}

/// Keep only the newest [`WHALE_ALERT_CAPACITY`] alerts of a serialized list.
fn deserialize_whale_alerts<'de, D>(deserializer: D) -> Result<Vec<WhaleAlert>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut alerts = Vec::<WhaleAlert>::deserialize(deserializer)?;
    alerts.truncate(WHALE_ALERT_CAPACITY);
    Ok(alerts)
}

impl TokenMarketState {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        price: f64,
        price_change_24h: f64,
        volume_24h: f64,
        market_cap: f64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            price,
            price_change_24h,
            volume_24h,
            market_cap,
            whale_alerts: Vec::with_capacity(WHALE_ALERT_CAPACITY),
            updated_at,
        }
    }

    /// Whale alerts, newest first.
    pub fn whale_alerts(&self) -> &[WhaleAlert] {
        &self.whale_alerts
    }

    /// The `n` most recent whale alerts (fewer if not available).
    pub fn recent_whale_alerts(&self, n: usize) -> &[WhaleAlert] {
        &self.whale_alerts[..n.min(self.whale_alerts.len())]
    }

    /// Prepend a whale alert, evicting the oldest entries beyond capacity.
    pub fn push_whale_alert(&mut self, alert: WhaleAlert) {
        self.whale_alerts.insert(0, alert);
        self.whale_alerts.truncate(WHALE_ALERT_CAPACITY);
    }

    /// True when every numeric field satisfies the record invariants.
    pub fn is_well_formed(&self) -> bool {
        self.price.is_finite()
            && self.price > 0.0
            && self.price_change_24h.is_finite()
            && self.volume_24h.is_finite()
            && self.volume_24h >= 0.0
            && self.market_cap.is_finite()
            && self.market_cap >= 0.0
    }
}

/// Immutable copy of the whole token collection as of one publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Number of completed ticks when this snapshot was taken
    pub tick: u64,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
    /// All tracked tokens
    pub tokens: Vec<TokenMarketState>,
}

impl MarketSnapshot {
    /// Look up a token by symbol (case-insensitive).
    pub fn token(&self, symbol: &str) -> Option<&TokenMarketState> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_alert(side: TradeSide, amount: f64) -> WhaleAlert {
        WhaleAlert {
            address: "TestWhaleAddress".to_string(),
            amount,
            side,
            timestamp: Utc::now(),
        }
    }

    fn create_test_token() -> TokenMarketState {
        TokenMarketState::new("Test Token", "TEST", 0.0001, 1.0, 1000.0, 50_000.0, Utc::now())
    }

    #[test]
    fn test_push_whale_alert_keeps_newest_first() {
        let mut token = create_test_token();
        token.push_whale_alert(create_test_alert(TradeSide::Buy, 1.0));
        token.push_whale_alert(create_test_alert(TradeSide::Sell, 2.0));

        assert_eq!(token.whale_alerts().len(), 2);
        assert_eq!(token.whale_alerts()[0].amount, 2.0);
        assert_eq!(token.whale_alerts()[1].amount, 1.0);
    }

    #[test]
    fn test_push_whale_alert_evicts_oldest() {
        let mut token = create_test_token();
        for i in 0..8 {
            token.push_whale_alert(create_test_alert(TradeSide::Buy, i as f64));
        }

        assert_eq!(token.whale_alerts().len(), WHALE_ALERT_CAPACITY);
        assert_eq!(token.whale_alerts()[0].amount, 7.0);
        assert_eq!(token.whale_alerts()[4].amount, 3.0);
    }

    #[test]
    fn test_recent_whale_alerts_bounds() {
        let mut token = create_test_token();
        assert!(token.recent_whale_alerts(3).is_empty());

        token.push_whale_alert(create_test_alert(TradeSide::Sell, 1.0));
        assert_eq!(token.recent_whale_alerts(3).len(), 1);
    }

    #[test]
    fn test_well_formed() {
        let mut token = create_test_token();
        assert!(token.is_well_formed());

        token.price = 0.0;
        assert!(!token.is_well_formed());

        token.price = f64::INFINITY;
        assert!(!token.is_well_formed());
    }

    #[test]
    fn test_trade_side_serialization() {
        let json = serde_json::to_string(&TradeSide::Buy).unwrap();
        assert_eq!(json, "\"buy\"");
    }

    #[test]
    fn test_deserialize_caps_whale_alerts() {
        let alerts: Vec<WhaleAlert> = (0..7)
            .map(|i| create_test_alert(TradeSide::Buy, (7 - i) as f64))
            .collect();
        let mut json = serde_json::to_value(create_test_token()).unwrap();
        json["whale_alerts"] = serde_json::to_value(&alerts).unwrap();

        let token: TokenMarketState = serde_json::from_value(json).unwrap();

        assert_eq!(token.whale_alerts().len(), WHALE_ALERT_CAPACITY);
        assert_eq!(token.whale_alerts()[0].amount, 7.0);
        assert_eq!(token.whale_alerts()[4].amount, 3.0);
    }

    #[test]
    fn test_snapshot_lookup_is_case_insensitive() {
        let snapshot = MarketSnapshot {
            tick: 1,
            taken_at: Utc::now(),
            tokens: vec![create_test_token()],
        };

        assert!(snapshot.token("test").is_some());
        assert!(snapshot.token("NOPE").is_none());
    }
}
