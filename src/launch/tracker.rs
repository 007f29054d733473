//! Launch tracker - polls a launch feed and broadcasts high-potential launches.

use crate::events::{EventBus, Subscription};
use crate::launch::source::LaunchSource;
use crate::launch::storage::LaunchStorage;
use crate::launch::types::{filter_high_potential, TokenLaunch, HIGH_POTENTIAL_SCORE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct LaunchTrackerConfig {
    pub poll_interval: Duration,
    pub min_potential_score: f64,
}

impl Default for LaunchTrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(300_000),
            min_potential_score: HIGH_POTENTIAL_SCORE,
        }
    }
}

struct TrackerCore {
    config: LaunchTrackerConfig,
    source: Arc<dyn LaunchSource>,
    storage: Option<Arc<dyn LaunchStorage>>,
    bus: EventBus<Arc<Vec<TokenLaunch>>>,
    latest: Mutex<Arc<Vec<TokenLaunch>>>,
    active: AtomicBool,
}

impl TrackerCore {
    /// Fetch, filter and store. Never fails: a broken feed yields an empty list.
    async fn collect(&self) -> Arc<Vec<TokenLaunch>> {
        let launches = match self.source.fetch_upcoming().await {
            Ok(launches) => launches,
            Err(e) => {
                warn!("Error fetching launches from {}: {:#}", self.source.name(), e);
                Vec::new()
            }
        };

        let high_potential = filter_high_potential(launches, self.config.min_potential_score);

        if let Some(storage) = &self.storage {
            if !high_potential.is_empty() {
                if let Err(e) = storage.upsert_launches(&high_potential).await {
                    warn!("Error storing launches: {:#}", e);
                }
            }
        }

        let high_potential = Arc::new(high_potential);
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = high_potential.clone();
        high_potential
    }

    fn publish(&self, launches: &Arc<Vec<TokenLaunch>>) {
        let delivered = self.bus.publish(launches);
        debug!(
            "Published {} high-potential launches to {} subscribers",
            launches.len(),
            delivered
        );
    }
}

/// Builder for [`LaunchTracker`].
pub struct LaunchTrackerBuilder {
    source: Arc<dyn LaunchSource>,
    config: LaunchTrackerConfig,
    storage: Option<Arc<dyn LaunchStorage>>,
}

impl LaunchTrackerBuilder {
    pub fn with_config(mut self, config: LaunchTrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    pub fn with_min_potential_score(mut self, min_potential_score: f64) -> Self {
        self.config.min_potential_score = min_potential_score;
        self
    }

    /// Persist every high-potential batch to `storage`.
    pub fn with_storage(mut self, storage: Arc<dyn LaunchStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn build(self) -> LaunchTracker {
        LaunchTracker {
            core: Arc::new(TrackerCore {
                config: self.config,
                source: self.source,
                storage: self.storage,
                bus: EventBus::new("launches"),
                latest: Mutex::new(Arc::new(Vec::new())),
                active: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }
}

/// Periodic poller for upcoming launches.
pub struct LaunchTracker {
    core: Arc<TrackerCore>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LaunchTracker {
    /// Tracker with default settings and no storage.
    pub fn new(source: Arc<dyn LaunchSource>) -> Self {
        Self::builder(source).build()
    }

    pub fn builder(source: Arc<dyn LaunchSource>) -> LaunchTrackerBuilder {
        LaunchTrackerBuilder {
            source,
            config: LaunchTrackerConfig::default(),
            storage: None,
        }
    }

    /// Poll the feed once and publish the result, running or not.
    pub async fn poll_once(&self) -> Arc<Vec<TokenLaunch>> {
        let launches = self.core.collect().await;
        self.core.publish(&launches);
        launches
    }

    /// Start polling. The first poll completes before this returns.
    /// Calling this while already running does nothing.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        if self.core.active.swap(true, Ordering::SeqCst) {
            debug!("Launch tracker already running");
            return;
        }

        info!(
            "Launch tracker started, polling {} every {}s",
            self.core.source.name(),
            self.core.config.poll_interval.as_secs()
        );

        let launches = self.core.collect().await;
        if !self.core.active.load(Ordering::SeqCst) {
            // stop() ran while the first poll was in flight
            return;
        }
        self.core.publish(&launches);

        let core = self.core.clone();
        let period = self.core.config.poll_interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if !core.active.load(Ordering::SeqCst) {
                    break;
                }

                let launches = core.collect().await;
                if core.active.load(Ordering::SeqCst) {
                    core.publish(&launches);
                }
            }
        });

        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    #[instrument(skip(self))]
    pub fn stop(&self) {
        let was_active = self.core.active.swap(false, Ordering::SeqCst);

        if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
        if was_active {
            info!("Launch tracker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.core.active.load(Ordering::SeqCst)
    }

    /// High-potential launches from the most recent poll.
    pub fn latest(&self) -> Arc<Vec<TokenLaunch>> {
        self.core
            .latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Vec<TokenLaunch>>) + Send + Sync + 'static,
    {
        self.core.bus.subscribe(listener)
    }

    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<Arc<Vec<TokenLaunch>>>) {
        self.core.bus.subscribe_channel()
    }
}

impl Drop for LaunchTracker {
    fn drop(&mut self) {
        self.core.active.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.get_mut().ok().and_then(|task| task.take()) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::types::SocialMetrics;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::Utc;

    struct FixedSource(Vec<TokenLaunch>);

    #[async_trait]
    impl LaunchSource for FixedSource {
        async fn fetch_upcoming(&self) -> Result<Vec<TokenLaunch>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl LaunchSource for BrokenSource {
        async fn fetch_upcoming(&self) -> Result<Vec<TokenLaunch>> {
            Err(anyhow!("feed unavailable"))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn create_test_launch(symbol: &str, score: f64) -> TokenLaunch {
        TokenLaunch {
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            launch_time: Utc::now(),
            platform: "pump.fun".to_string(),
            initial_market_cap: 10_000.0,
            description: String::new(),
            social_metrics: SocialMetrics::default(),
            audit_status: false,
            kyc_status: false,
            potential_score: score,
        }
    }

    #[tokio::test]
    async fn test_poll_filters_low_potential() {
        let source = FixedSource(vec![
            create_test_launch("HIGH", 90.0),
            create_test_launch("LOW", 40.0),
            create_test_launch("EDGE", 70.0),
        ]);
        let tracker = LaunchTracker::new(Arc::new(source));

        let launches = tracker.poll_once().await;
        let symbols: Vec<&str> = launches.iter().map(|l| l.symbol.as_str()).collect();

        assert_eq!(symbols, vec!["HIGH", "EDGE"]);
        assert_eq!(tracker.latest(), launches);
    }

    #[tokio::test]
    async fn test_fetch_failure_publishes_empty_list() {
        let tracker = LaunchTracker::new(Arc::new(BrokenSource));
        let (_sub, mut rx) = tracker.subscribe_channel();

        let launches = tracker.poll_once().await;

        assert!(launches.is_empty());
        assert!(rx.recv().await.unwrap().is_empty());
    }
}
