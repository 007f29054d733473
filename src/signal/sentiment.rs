//! Coarse sentiment readings used alongside recommendations.

use crate::types::{TradeSide, WhaleAlert};
use serde::{Deserialize, Serialize};

/// Three-level sentiment bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Neutral,
    Bearish,
}

/// 24h change at or beyond which price sentiment leaves neutral.
pub const PRICE_SENTIMENT_BAND: f64 = 3.0;

/// Sentiment from the 24h price change alone.
pub fn price_sentiment(price_change_24h: f64) -> Sentiment {
    if price_change_24h >= PRICE_SENTIMENT_BAND {
        Sentiment::Bullish
    } else if price_change_24h <= -PRICE_SENTIMENT_BAND {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

/// Share of buys among all whale alerts, in percent. 50 when there are none.
pub fn whale_sentiment_score(whale_alerts: &[WhaleAlert]) -> f64 {
    let buys = whale_alerts
        .iter()
        .filter(|a| a.side == TradeSide::Buy)
        .count();
    let total = whale_alerts.len();

    if total == 0 {
        50.0
    } else {
        buys as f64 / total as f64 * 100.0
    }
}

/// Bucket a whale sentiment score.
pub fn whale_sentiment(whale_alerts: &[WhaleAlert]) -> Sentiment {
    let score = whale_sentiment_score(whale_alerts);
    if score >= 60.0 {
        Sentiment::Bullish
    } else if score >= 40.0 {
        Sentiment::Neutral
    } else {
        Sentiment::Bearish
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn alert(side: TradeSide) -> WhaleAlert {
        WhaleAlert {
            address: "TestWhale".to_string(),
            amount: 1.0,
            side,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_price_sentiment_bands() {
        assert_eq!(price_sentiment(3.0), Sentiment::Bullish);
        assert_eq!(price_sentiment(2.99), Sentiment::Neutral);
        assert_eq!(price_sentiment(-3.0), Sentiment::Bearish);
    }

    #[test]
    fn test_whale_sentiment_without_alerts_is_neutral() {
        assert_eq!(whale_sentiment_score(&[]), 50.0);
        assert_eq!(whale_sentiment(&[]), Sentiment::Neutral);
    }

    #[test]
    fn test_whale_sentiment_buckets() {
        let bullish = vec![alert(TradeSide::Buy), alert(TradeSide::Buy), alert(TradeSide::Sell)];
        assert_eq!(whale_sentiment(&bullish), Sentiment::Bullish);

        let bearish = vec![alert(TradeSide::Sell), alert(TradeSide::Sell), alert(TradeSide::Buy)];
        assert_eq!(whale_sentiment(&bearish), Sentiment::Bearish);

        let even = vec![alert(TradeSide::Sell), alert(TradeSide::Buy)];
        assert_eq!(whale_sentiment(&even), Sentiment::Neutral);
    }
}
