//! User price alerts checked against the simulated market.

use crate::events::{EventBus, Subscription};
use crate::market::MarketSimulator;
use crate::types::MarketSnapshot;
use anyhow::{bail, ensure, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(60_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    /// Upper-cased ticker symbol
    pub symbol: String,
    pub target: f64,
    pub condition: AlertCondition,
}

impl PriceAlert {
    pub fn new(symbol: &str, target: f64, condition: AlertCondition) -> Self {
        Self {
            symbol: symbol.to_ascii_uppercase(),
            target,
            condition,
        }
    }

    /// Inclusive on the target price.
    pub fn is_triggered(&self, price: f64) -> bool {
        match self.condition {
            AlertCondition::Above => price >= self.target,
            AlertCondition::Below => price <= self.target,
        }
    }
}

/// `SYMBOL>PRICE` or `SYMBOL<PRICE`.
impl FromStr for PriceAlert {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (symbol, target, condition) = if let Some((symbol, target)) = s.split_once('>') {
            (symbol, target, AlertCondition::Above)
        } else if let Some((symbol, target)) = s.split_once('<') {
            (symbol, target, AlertCondition::Below)
        } else {
            bail!("price alert '{}' must look like SYMBOL>PRICE or SYMBOL<PRICE", s);
        };

        let symbol = symbol.trim();
        ensure!(!symbol.is_empty(), "price alert '{}' has no symbol", s);

        let target: f64 = target
            .trim()
            .parse()
            .with_context(|| format!("price alert '{}' has an invalid price", s))?;
        ensure!(
            target.is_finite() && target > 0.0,
            "price alert '{}' needs a positive price",
            s
        );

        Ok(PriceAlert::new(symbol, target, condition))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredAlert {
    pub alert: PriceAlert,
    pub price: f64,
    pub triggered_at: DateTime<Utc>,
}

impl fmt::Display for TriggeredAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is now {} ${} (Current: ${})",
            self.alert.symbol,
            self.alert.condition.as_str(),
            self.alert.target,
            self.price
        )
    }
}

/// Alerts grouped by symbol. Alerts stay armed after they fire.
#[derive(Debug, Clone, Default)]
pub struct PriceAlertBook {
    alerts: HashMap<String, Vec<PriceAlert>>,
}

impl PriceAlertBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alert: PriceAlert) {
        self.alerts.entry(alert.symbol.clone()).or_default().push(alert);
    }

    pub fn set_alert(&mut self, symbol: &str, target: f64, condition: AlertCondition) {
        self.add(PriceAlert::new(symbol, target, condition));
    }

    /// Remove every alert for `symbol`. Returns how many were removed.
    pub fn clear_symbol(&mut self, symbol: &str) -> usize {
        self.alerts
            .remove(&symbol.to_ascii_uppercase())
            .map_or(0, |alerts| alerts.len())
    }

    pub fn alerts_for(&self, symbol: &str) -> &[PriceAlert] {
        self.alerts
            .get(&symbol.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.alerts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every alert whose condition holds at the snapshot's prices.
    pub fn check(&self, snapshot: &MarketSnapshot) -> Vec<TriggeredAlert> {
        let now = Utc::now();
        let mut triggered = Vec::new();

        for (symbol, alerts) in &self.alerts {
            let Some(token) = snapshot.token(symbol) else {
                debug!("No market data for alerted symbol {}", symbol);
                continue;
            };

            triggered.extend(
                alerts
                    .iter()
                    .filter(|alert| alert.is_triggered(token.price))
                    .map(|alert| TriggeredAlert {
                        alert: alert.clone(),
                        price: token.price,
                        triggered_at: now,
                    }),
            );
        }

        triggered
    }
}

impl FromIterator<PriceAlert> for PriceAlertBook {
    fn from_iter<I: IntoIterator<Item = PriceAlert>>(iter: I) -> Self {
        let mut book = Self::new();
        for alert in iter {
            book.add(alert);
        }
        book
    }
}

struct MonitorState {
    handle: JoinHandle<()>,
    market: Subscription,
}

/// Checks the alert book against the latest market snapshot on an interval.
pub struct PriceAlertMonitor {
    check_interval: Duration,
    book: Arc<RwLock<PriceAlertBook>>,
    latest: Arc<Mutex<Option<Arc<MarketSnapshot>>>>,
    bus: EventBus<TriggeredAlert>,
    active: Arc<AtomicBool>,
    running: Mutex<Option<MonitorState>>,
}

impl PriceAlertMonitor {
    pub fn new(book: PriceAlertBook, check_interval: Duration) -> Self {
        Self {
            check_interval: check_interval.max(Duration::from_millis(1)),
            book: Arc::new(RwLock::new(book)),
            latest: Arc::new(Mutex::new(None)),
            bus: EventBus::new("price-alerts"),
            active: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        }
    }

    pub fn set_alert(&self, symbol: &str, target: f64, condition: AlertCondition) {
        self.book
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .set_alert(symbol, target, condition);
    }

    pub fn alert_count(&self) -> usize {
        self.book.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check the latest snapshot now and publish whatever fires.
    pub fn check_now(&self) -> Vec<TriggeredAlert> {
        run_check(&self.book, &self.latest, &self.bus)
    }

    /// Follow `simulator`. The first check happens one interval after start.
    #[instrument(skip_all)]
    pub fn start(&self, simulator: &MarketSimulator) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("Price alert monitor already running");
            return;
        }

        self.active.store(true, Ordering::SeqCst);
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(simulator.snapshot());

        let latest = self.latest.clone();
        let market = simulator.subscribe(move |snapshot| {
            *latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        });

        let book = self.book.clone();
        let latest = self.latest.clone();
        let bus = self.bus.clone();
        let active = self.active.clone();
        let period = self.check_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                run_check(&book, &latest, &bus);
            }
        });

        *running = Some(MonitorState { handle, market });
        info!(
            "Price alert monitor started with {} alerts, checking every {}s",
            self.alert_count(),
            period.as_secs()
        );
    }

    #[instrument(skip_all)]
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);

        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(MonitorState { handle, market }) = running.take() {
            market.unsubscribe();
            handle.abort();
            info!("Price alert monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TriggeredAlert) + Send + Sync + 'static,
    {
        self.bus.subscribe(listener)
    }
}

impl Drop for PriceAlertMonitor {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(MonitorState { handle, market }) = self.running.get_mut().ok().and_then(|r| r.take()) {
            market.unsubscribe();
            handle.abort();
        }
    }
}

fn run_check(
    book: &RwLock<PriceAlertBook>,
    latest: &Mutex<Option<Arc<MarketSnapshot>>>,
    bus: &EventBus<TriggeredAlert>,
) -> Vec<TriggeredAlert> {
    let Some(snapshot) = latest.lock().unwrap_or_else(|e| e.into_inner()).clone() else {
        debug!("No market snapshot yet, skipping price alert check");
        return Vec::new();
    };

    let triggered = book.read().unwrap_or_else(|e| e.into_inner()).check(&snapshot);
    for alert in &triggered {
        info!("Price alert: {}", alert);
        bus.publish(alert);
    }
    triggered
}
