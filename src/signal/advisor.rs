//! Signal advisor - keeps a recommendation board in step with the market.
//!
//! The advisor follows a [`MarketSimulator`], rescoring every token whenever a
//! new snapshot arrives and again on its own refresh timer.

use crate::events::{EventBus, Subscription};
use crate::market::MarketSimulator;
use crate::signal::prediction::PricePrediction;
use crate::signal::scorer::{Recommendation, SignalScore};
use crate::signal::sentiment::{price_sentiment, whale_sentiment, Sentiment};
use crate::types::{MarketSnapshot, TokenMarketState};
use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(5000);

/// Everything shown for one token on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSignal {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub price_change_24h: f64,
    pub score: Option<SignalScore>,
    pub recommendation: Recommendation,
    pub prediction: Option<PricePrediction>,
    pub whale_sentiment: Sentiment,
    pub price_sentiment: Sentiment,
}

impl TokenSignal {
    /// Score a token and attach a price projection.
    pub fn evaluate<R: Rng + ?Sized>(token: &TokenMarketState, rng: &mut R) -> Self {
        let score = SignalScore::compute(token.price_change_24h, token.whale_alerts());
        let recommendation = score.recommend();
        let prediction = PricePrediction::project(token.price, recommendation.clone(), rng);

        Self {
            score: Some(score),
            recommendation,
            prediction: Some(prediction),
            ..Self::pending(token)
        }
    }

    /// Entry for a token that has not been scored yet.
    pub fn pending(token: &TokenMarketState) -> Self {
        Self {
            symbol: token.symbol.clone(),
            name: token.name.clone(),
            price: token.price,
            price_change_24h: token.price_change_24h,
            score: None,
            recommendation: Recommendation::pending(),
            prediction: None,
            whale_sentiment: whale_sentiment(token.whale_alerts()),
            price_sentiment: price_sentiment(token.price_change_24h),
        }
    }
}

/// Per-token signals derived from one market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBoard {
    pub generated_at: DateTime<Utc>,
    /// Tick of the snapshot the board was computed from
    pub source_tick: u64,
    pub signals: Vec<TokenSignal>,
}

impl SignalBoard {
    pub fn from_snapshot<R: Rng + ?Sized>(snapshot: &MarketSnapshot, rng: &mut R) -> Self {
        Self {
            generated_at: Utc::now(),
            source_tick: snapshot.tick,
            signals: snapshot
                .tokens
                .iter()
                .map(|token| TokenSignal::evaluate(token, rng))
                .collect(),
        }
    }

    pub fn pending(snapshot: &MarketSnapshot) -> Self {
        Self {
            generated_at: Utc::now(),
            source_tick: snapshot.tick,
            signals: snapshot.tokens.iter().map(TokenSignal::pending).collect(),
        }
    }

    /// Case-insensitive lookup by ticker symbol.
    pub fn signal(&self, symbol: &str) -> Option<&TokenSignal> {
        self.signals
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
    }
}

struct AdvisorCore {
    bus: EventBus<Arc<SignalBoard>>,
    rng: Mutex<StdRng>,
    latest: Mutex<Option<Arc<SignalBoard>>>,
    active: AtomicBool,
    boards_published: AtomicU64,
}

impl AdvisorCore {
    fn evaluate(&self, snapshot: &MarketSnapshot) {
        let board = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            Arc::new(SignalBoard::from_snapshot(snapshot, &mut *rng))
        };

        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(board.clone());

        if self.active.load(Ordering::SeqCst) {
            let delivered = self.bus.publish(&board);
            self.boards_published.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Published signal board for tick {} to {} subscribers",
                board.source_tick, delivered
            );
        }
    }
}

struct Running {
    handle: JoinHandle<()>,
    market: Subscription,
}

/// Service that rescores the market on change and on a fixed refresh interval.
pub struct SignalAdvisor {
    refresh_interval: Duration,
    core: Arc<AdvisorCore>,
    running: Mutex<Option<Running>>,
}

impl SignalAdvisor {
    pub fn new(refresh_interval: Duration, rng: StdRng) -> Result<Self> {
        ensure!(!refresh_interval.is_zero(), "refresh interval must be positive");

        Ok(Self {
            refresh_interval,
            core: Arc::new(AdvisorCore {
                bus: EventBus::new("signals"),
                rng: Mutex::new(rng),
                latest: Mutex::new(None),
                active: AtomicBool::new(false),
                boards_published: AtomicU64::new(0),
            }),
            running: Mutex::new(None),
        })
    }

    pub fn from_entropy(refresh_interval: Duration) -> Result<Self> {
        Self::new(refresh_interval, StdRng::from_entropy())
    }

    /// Start following `simulator`. The first board is computed right away
    /// from the simulator's current state.
    #[instrument(skip_all)]
    pub fn start(&self, simulator: &MarketSimulator) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("Signal advisor already running");
            return;
        }

        self.core.active.store(true, Ordering::SeqCst);

        let (market, mut snapshots) = simulator.subscribe_channel();
        let mut latest = simulator.snapshot();
        let core = self.core.clone();
        let period = self.refresh_interval;

        let handle = tokio::spawn(async move {
            // First tick completes immediately.
            let mut refresh = tokio::time::interval(period);
            refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = snapshots.recv() => match received {
                        Some(snapshot) => {
                            latest = snapshot;
                            core.evaluate(&latest);
                        }
                        None => break,
                    },
                    _ = refresh.tick() => core.evaluate(&latest),
                }
            }
        });

        *running = Some(Running { handle, market });
        info!(
            "Signal advisor started, refreshing every {}ms",
            self.refresh_interval.as_millis()
        );
    }

    #[instrument(skip_all)]
    pub fn stop(&self) {
        self.core.active.store(false, Ordering::SeqCst);

        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(Running { handle, market }) = running.take() {
            market.unsubscribe();
            handle.abort();
            info!("Signal advisor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        self.core.active.load(Ordering::SeqCst)
            && running.as_ref().is_some_and(|r| !r.handle.is_finished())
    }

    /// Most recently computed board, if any.
    pub fn latest_board(&self) -> Option<Arc<SignalBoard>> {
        self.core
            .latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn boards_published(&self) -> u64 {
        self.core.boards_published.load(Ordering::Relaxed)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<SignalBoard>) + Send + Sync + 'static,
    {
        self.core.bus.subscribe(listener)
    }

    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<Arc<SignalBoard>>) {
        self.core.bus.subscribe_channel()
    }
}

impl Drop for SignalAdvisor {
    fn drop(&mut self) {
        self.core.active.store(false, Ordering::SeqCst);
        if let Some(Running { handle, market }) = self.running.get_mut().ok().and_then(|r| r.take()) {
            market.unsubscribe();
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::default_market;
    use crate::signal::scorer::Action;

    fn create_test_snapshot() -> MarketSnapshot {
        MarketSnapshot {
            tick: 0,
            taken_at: Utc::now(),
            tokens: default_market(Utc::now()).into_iter().collect(),
        }
    }

    #[test]
    fn test_board_from_seed_market() {
        let snapshot = create_test_snapshot();
        let board = SignalBoard::from_snapshot(&snapshot, &mut StdRng::seed_from_u64(1));

        assert_eq!(board.signals.len(), 3);

        // +5.8% with one buy
        let solf = board.signal("solf").unwrap();
        assert_eq!(solf.recommendation.action, Action::Buy);
        assert_eq!(solf.price_sentiment, Sentiment::Bullish);
        assert_eq!(solf.whale_sentiment, Sentiment::Bullish);

        // -4.2% with one sell
        let lbot = board.signal("LBOT").unwrap();
        assert_eq!(lbot.recommendation.action, Action::Sell);
        assert_eq!(lbot.price_sentiment, Sentiment::Bearish);

        // +1.2% with one buy
        let nsol = board.signal("NSOL").unwrap();
        assert_eq!(nsol.recommendation.action, Action::Buy);
        assert_eq!(nsol.price_sentiment, Sentiment::Neutral);

        for signal in &board.signals {
            let prediction = signal.prediction.as_ref().unwrap();
            assert_eq!(prediction.recommendation, signal.recommendation);
        }
    }

    #[test]
    fn test_pending_board() {
        let board = SignalBoard::pending(&create_test_snapshot());

        for signal in &board.signals {
            assert_eq!(signal.recommendation, Recommendation::pending());
            assert!(signal.score.is_none());
            assert!(signal.prediction.is_none());
        }
    }

    #[test]
    fn test_zero_refresh_interval_rejected() {
        assert!(SignalAdvisor::new(Duration::ZERO, StdRng::seed_from_u64(0)).is_err());
    }
}
