//! Recommendation scoring and the services built around it.

pub mod advisor;
pub mod prediction;
pub mod scorer;
pub mod sentiment;

pub use advisor::{SignalAdvisor, SignalBoard, TokenSignal};
pub use prediction::PricePrediction;
pub use scorer::{score, score_token, Action, Allocation, Recommendation, SignalScore};
pub use sentiment::{price_sentiment, whale_sentiment, Sentiment};
