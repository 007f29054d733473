//! Fixed seed tokens the simulator starts from.

use crate::types::{TokenMarketState, TradeSide, WhaleAlert};
use chrono::{DateTime, Duration, Utc};
use nonempty::NonEmpty;

fn seed_token(
    name: &str,
    symbol: &str,
    price: f64,
    price_change_24h: f64,
    volume_24h: f64,
    market_cap: f64,
    whale: (&str, f64, TradeSide, i64),
    now: DateTime<Utc>,
) -> TokenMarketState {
    let (address, amount, side, minutes_ago) = whale;
    let mut token = TokenMarketState::new(name, symbol, price, price_change_24h, volume_24h, market_cap, now);
    token.push_whale_alert(WhaleAlert {
        address: address.to_string(),
        amount,
        side,
        timestamp: now - Duration::minutes(minutes_ago),
    });
    token
}

/// The default tracked market, each token carrying one historical whale alert.
pub fn default_market(now: DateTime<Utc>) -> NonEmpty<TokenMarketState> {
    NonEmpty::from((
        seed_token(
            "SOLAI FLASH",
            "SOLF",
            0.00001234,
            5.8,
            1_500_000.0,
            12_500_000.0,
            ("HN7cABqLq46Es1jh92dQQisAq662SmxELLLsHHe4YWrH", 250_000.0, TradeSide::Buy, 15),
            now,
        ),
        vec![
            seed_token(
                "LIGHTNING BOT",
                "LBOT",
                0.00000789,
                -4.2,
                2_100_000.0,
                7_890_000.0,
                ("9W959DhEoH8C8Wy5DgXBSvVqppxdJkmNCH7nZCne2YyA", 320_000.0, TradeSide::Sell, 5),
                now,
            ),
            seed_token(
                "NEURAL SOL",
                "NSOL",
                0.00002345,
                1.2,
                980_000.0,
                4_560_000.0,
                ("BKWPHuHkCCzEFoqHhPW8hHGDmviGKvSpGZXdKwpsgvdM", 150_000.0, TradeSide::Buy, 30),
                now,
            ),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_market_shape() {
        let now = Utc::now();
        let market = default_market(now);

        assert_eq!(market.len(), 3);
        assert_eq!(market.head.symbol, "SOLF");
        for token in market.iter() {
            assert!(token.is_well_formed());
            assert_eq!(token.whale_alerts().len(), 1);
            assert!(token.whale_alerts()[0].timestamp < now);
        }
    }
}
