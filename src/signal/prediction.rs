//! Display-only price projection.
//!
//! The projection is cosmetic: its confidence is random and it never feeds
//! back into the recommendation it carries.

use crate::signal::scorer::Recommendation;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const PRICE_TARGET_MULTIPLIER: f64 = 1.5;
pub const PREDICTION_TIMEFRAME: &str = "24H";

/// Price target and display confidence shown next to a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    pub price_target: f64,
    /// Display confidence in percent, within [75, 95)
    pub confidence: f64,
    pub timeframe: String,
    pub recommendation: Recommendation,
}

impl PricePrediction {
    pub fn project<R: Rng + ?Sized>(price: f64, recommendation: Recommendation, rng: &mut R) -> Self {
        Self {
            price_target: price * PRICE_TARGET_MULTIPLIER,
            confidence: rng.gen_range(75.0..95.0),
            timeframe: PREDICTION_TIMEFRAME.to_string(),
            recommendation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::scorer::{Action, Recommendation};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_projection() {
        let mut rng = StdRng::seed_from_u64(7);
        let rec = Recommendation::for_action(Action::Hold);

        for _ in 0..100 {
            let prediction = PricePrediction::project(0.00002, rec.clone(), &mut rng);
            assert!((prediction.price_target - 0.00003).abs() < 1e-12);
            assert!(prediction.confidence >= 75.0 && prediction.confidence < 95.0);
            assert_eq!(prediction.timeframe, "24H");
            assert_eq!(prediction.recommendation, rec);
        }
    }

    #[test]
    fn test_projection_is_reproducible_for_seed() {
        let rec = Recommendation::pending();
        let a = PricePrediction::project(1.0, rec.clone(), &mut StdRng::seed_from_u64(42));
        let b = PricePrediction::project(1.0, rec, &mut StdRng::seed_from_u64(42));

        assert_eq!(a, b);
    }
}
