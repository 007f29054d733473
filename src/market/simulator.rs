//! Market simulator - periodically perturbs the mock token market.
//!
//! [`MarketState`] holds the pure state transition so it can be stepped by hand
//! with any RNG. [`MarketSimulator`] wraps it in a timer-driven service that
//! publishes a [`MarketSnapshot`] after every successful tick.

use crate::events::{EventBus, Subscription};
use crate::market::seed::default_market;
use crate::types::{MarketSnapshot, TokenMarketState, TradeSide, WhaleAlert};
use anyhow::{anyhow, ensure, Result};
use chrono::{DateTime, Utc};
use nonempty::NonEmpty;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const WHALE_ADDRESS_LEN: usize = 44;

/// Simulator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Time between ticks
    pub tick_interval: Duration,
    /// Chance per token per tick of a new whale alert
    pub whale_alert_probability: f64,
    /// Largest absolute change applied to the 24h percent change per tick
    pub max_price_drift: f64,
    /// Largest relative volume change per tick (0.10 = 10%)
    pub volume_jitter: f64,
    /// Bound on the absolute 24h percent change. Below 100 so price never hits zero.
    pub max_change_24h: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            whale_alert_probability: 0.30,
            max_price_drift: 2.0,
            volume_jitter: 0.10,
            max_change_24h: 95.0,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.tick_interval.is_zero(), "tick interval must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.whale_alert_probability),
            "whale alert probability must be within [0, 1], got {}",
            self.whale_alert_probability
        );
        ensure!(
            self.max_price_drift.is_finite() && self.max_price_drift >= 0.0,
            "max price drift must be a non-negative number"
        );
        ensure!(
            self.volume_jitter.is_finite() && (0.0..1.0).contains(&self.volume_jitter),
            "volume jitter must be within [0, 1)"
        );
        ensure!(
            self.max_change_24h.is_finite() && self.max_change_24h > 0.0 && self.max_change_24h < 100.0,
            "max 24h change must be within (0, 100), got {}",
            self.max_change_24h
        );
        Ok(())
    }
}

/// Counters describing simulator activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorStats {
    pub ticks_completed: u64,
    pub ticks_failed: u64,
    pub whale_alerts_generated: u64,
    pub snapshots_published: u64,
}

/// The token collection and its per-tick state transition.
#[derive(Debug, Clone)]
pub struct MarketState {
    tokens: Vec<TokenMarketState>,
    ticks: u64,
}

impl MarketState {
    pub fn new(seed: NonEmpty<TokenMarketState>) -> Self {
        Self {
            tokens: seed.into_iter().collect(),
            ticks: 0,
        }
    }

    pub fn tokens(&self) -> &[TokenMarketState] {
        &self.tokens
    }

    /// Number of successfully applied ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Apply one tick to every token.
    ///
    /// The tick is staged on a copy and committed only if every token is still
    /// well formed afterwards. Returns the number of whale alerts generated.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        config: &SimulatorConfig,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut staged = self.tokens.clone();
        let mut generated = 0;

        for token in staged.iter_mut() {
            perturb_token(token, config, rng);

            if rng.gen_bool(config.whale_alert_probability) {
                token.push_whale_alert(generate_whale_alert(token.price, rng, now));
                generated += 1;
            }

            token.updated_at = now;

            ensure!(
                token.is_well_formed(),
                "{} left the valid range (price {}, change {:.2}%, volume {}, cap {})",
                token.symbol,
                token.price,
                token.price_change_24h,
                token.volume_24h,
                token.market_cap
            );
        }

        self.tokens = staged;
        self.ticks += 1;
        Ok(generated)
    }

    pub fn snapshot(&self, taken_at: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            tick: self.ticks,
            taken_at,
            tokens: self.tokens.clone(),
        }
    }
}

/// Random-walk the 24h change, then move price, volume and market cap.
///
/// The walk is bounded by `max_change_24h` and the figures are clamped to the
/// finite range, so a long run saturates instead of overflowing to infinity or
/// underflowing to zero.
fn perturb_token<R: Rng + ?Sized>(token: &mut TokenMarketState, config: &SimulatorConfig, rng: &mut R) {
    let drift = rng.gen_range(-config.max_price_drift..=config.max_price_drift);
    token.price_change_24h =
        (token.price_change_24h + drift).clamp(-config.max_change_24h, config.max_change_24h);

    let factor = 1.0 + token.price_change_24h / 100.0;
    token.price = (token.price * factor).clamp(f64::MIN_POSITIVE, f64::MAX);
    token.market_cap = (token.market_cap * factor).clamp(0.0, f64::MAX);

    let volume_factor = 1.0 + rng.gen_range(-config.volume_jitter..=config.volume_jitter);
    token.volume_24h = (token.volume_24h * volume_factor).clamp(0.0, f64::MAX);
}

/// Synthesize a whale transfer sized relative to the current price.
pub fn generate_whale_alert<R: Rng + ?Sized>(price: f64, rng: &mut R, now: DateTime<Utc>) -> WhaleAlert {
    let multiplier = rng.gen_range(5..15) as f64;
    let amount = price * multiplier * rng.gen_range(500_000.0..1_500_000.0);
    let amount = amount.clamp(f64::MIN_POSITIVE, f64::MAX);
    let side = if rng.gen_bool(0.5) {
        TradeSide::Buy
    } else {
        TradeSide::Sell
    };

    WhaleAlert {
        address: generate_address(rng),
        amount,
        side,
        timestamp: now,
    }
}

/// Random base58 string shaped like a Solana address.
pub fn generate_address<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..WHALE_ADDRESS_LEN)
        .map(|_| BASE58_ALPHABET[rng.gen_range(0..BASE58_ALPHABET.len())] as char)
        .collect()
}

struct Engine {
    market: MarketState,
    rng: StdRng,
}

struct SimulatorCore {
    config: SimulatorConfig,
    engine: Mutex<Engine>,
    bus: EventBus<Arc<MarketSnapshot>>,
    active: AtomicBool,
    ticks_failed: AtomicU64,
    whale_alerts_generated: AtomicU64,
    snapshots_published: AtomicU64,
}

impl SimulatorCore {
    fn step(&self) -> Result<Arc<MarketSnapshot>> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|_| anyhow!("simulator state lock poisoned"))?;
        let Engine { market, rng } = &mut *engine;

        let now = Utc::now();
        let generated = market.advance(&self.config, rng, now)?;
        self.whale_alerts_generated
            .fetch_add(generated as u64, Ordering::Relaxed);

        Ok(Arc::new(market.snapshot(now)))
    }

    fn publish(&self, snapshot: &Arc<MarketSnapshot>) {
        let delivered = self.bus.publish(snapshot);
        self.snapshots_published.fetch_add(1, Ordering::Relaxed);
        debug!("Published market tick {} to {} subscribers", snapshot.tick, delivered);
    }

    /// Run one tick. Failures are logged and the tick is skipped.
    fn run_tick(&self) -> Option<Arc<MarketSnapshot>> {
        match self.step() {
            Ok(snapshot) => {
                // A stop() that raced with this tick suppresses its publication.
                if self.active.load(Ordering::SeqCst) {
                    self.publish(&snapshot);
                }
                Some(snapshot)
            }
            Err(e) => {
                self.ticks_failed.fetch_add(1, Ordering::Relaxed);
                warn!("Error updating market data, skipping tick: {:#}", e);
                None
            }
        }
    }

    fn current_snapshot(&self) -> Arc<MarketSnapshot> {
        let engine = self.engine.lock().unwrap_or_else(|e| e.into_inner());
        Arc::new(engine.market.snapshot(Utc::now()))
    }
}

/// Timer-driven owner of the mock market.
pub struct MarketSimulator {
    core: Arc<SimulatorCore>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MarketSimulator {
    /// Create a simulator over the given tokens using the given RNG.
    pub fn new(config: SimulatorConfig, seed: NonEmpty<TokenMarketState>, rng: StdRng) -> Result<Self> {
        config.validate()?;

        info!(
            "Created market simulator with {} tokens, tick every {}ms",
            seed.len(),
            config.tick_interval.as_millis()
        );

        Ok(Self {
            core: Arc::new(SimulatorCore {
                config,
                engine: Mutex::new(Engine {
                    market: MarketState::new(seed),
                    rng,
                }),
                bus: EventBus::new("market"),
                active: AtomicBool::new(false),
                ticks_failed: AtomicU64::new(0),
                whale_alerts_generated: AtomicU64::new(0),
                snapshots_published: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        })
    }

    /// Simulator over the default market with a reproducible RNG.
    pub fn with_seed(config: SimulatorConfig, seed: u64) -> Result<Self> {
        Self::new(config, default_market(Utc::now()), StdRng::seed_from_u64(seed))
    }

    /// Simulator over the default market with an OS-seeded RNG.
    pub fn from_entropy(config: SimulatorConfig) -> Result<Self> {
        Self::new(config, default_market(Utc::now()), StdRng::from_entropy())
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.core.config
    }

    /// Start ticking. Runs one tick immediately, then one per interval.
    /// Calling this while already running does nothing.
    #[instrument(skip(self))]
    pub fn start(&self) {
        {
            let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
            if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
                debug!("Market simulator already running");
                return;
            }

            self.core.active.store(true, Ordering::SeqCst);

            let core = self.core.clone();
            let period = core.config.tick_interval;
            *task = Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    interval.tick().await;
                    if !core.active.load(Ordering::SeqCst) {
                        break;
                    }
                    core.run_tick();
                }
            }));
        }

        info!("Market simulator started");
        self.core.run_tick();
    }

    /// Stop ticking. Calling this while stopped does nothing.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        self.core.active.store(false, Ordering::SeqCst);

        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
            info!("Market simulator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        self.core.active.load(Ordering::SeqCst)
            && task.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Advance the market by one tick right now and publish the result.
    /// Returns `None` if the tick failed.
    pub fn tick_now(&self) -> Option<Arc<MarketSnapshot>> {
        match self.core.step() {
            Ok(snapshot) => {
                self.core.publish(&snapshot);
                Some(snapshot)
            }
            Err(e) => {
                self.core.ticks_failed.fetch_add(1, Ordering::Relaxed);
                warn!("Error updating market data, skipping tick: {:#}", e);
                None
            }
        }
    }

    /// Current market state.
    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.core.current_snapshot()
    }

    pub fn stats(&self) -> SimulatorStats {
        let ticks_completed = {
            let engine = self.core.engine.lock().unwrap_or_else(|e| e.into_inner());
            engine.market.ticks()
        };

        SimulatorStats {
            ticks_completed,
            ticks_failed: self.core.ticks_failed.load(Ordering::Relaxed),
            whale_alerts_generated: self.core.whale_alerts_generated.load(Ordering::Relaxed),
            snapshots_published: self.core.snapshots_published.load(Ordering::Relaxed),
        }
    }

    /// Receive every published snapshot through a callback.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<MarketSnapshot>) + Send + Sync + 'static,
    {
        self.core.bus.subscribe(listener)
    }

    /// Receive every published snapshot through a channel.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<Arc<MarketSnapshot>>) {
        self.core.bus.subscribe_channel()
    }
}

impl Drop for MarketSimulator {
    fn drop(&mut self) {
        self.core.active.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.get_mut().ok().and_then(|task| task.take()) {
            handle.abort();
        }
    }
}
