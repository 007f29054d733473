//! Runtime configuration.
//!
//! Defaults cover a fully local run. Every field can be overridden from a
//! `XELION_*` environment variable, and [`ConfigBuilder`] offers the same
//! knobs in code.

use crate::alerts::{PriceAlert, DEFAULT_CHECK_INTERVAL};
use crate::launch::{HttpSourceConfig, LaunchTrackerConfig, HIGH_POTENTIAL_SCORE};
use crate::market::SimulatorConfig;
use crate::signal::advisor::DEFAULT_REFRESH_INTERVAL;
use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Whole milliseconds in `interval`, saturating at `u64::MAX`.
fn duration_millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XelionConfig {
    /// Market simulator tick, milliseconds
    pub tick_interval_ms: u64,
    /// Recommendation refresh, milliseconds
    pub refresh_interval_ms: u64,
    /// Launch feed poll, milliseconds
    pub launch_poll_interval_ms: u64,
    pub min_potential_score: f64,
    /// Price alert check, milliseconds
    pub price_alert_interval_ms: u64,
    pub whale_alert_probability: f64,
    pub launch_api_base_url: String,
    pub http_retry_attempts: usize,
    pub http_timeout_secs: u64,
    pub rate_limit_per_second: u32,
    /// SQLite URL for launch storage. Launches are not persisted when unset.
    pub database_url: Option<String>,
    /// Fixed seed for reproducible runs
    pub rng_seed: Option<u64>,
    pub log_level: String,
    pub price_alerts: Vec<PriceAlert>,
}

impl Default for XelionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            refresh_interval_ms: duration_millis(DEFAULT_REFRESH_INTERVAL),
            launch_poll_interval_ms: 300_000,
            min_potential_score: HIGH_POTENTIAL_SCORE,
            price_alert_interval_ms: duration_millis(DEFAULT_CHECK_INTERVAL),
            whale_alert_probability: 0.30,
            launch_api_base_url: "https://api.pump.fun/v1".to_string(),
            http_retry_attempts: 3,
            http_timeout_secs: 10,
            rate_limit_per_second: 5,
            database_url: None,
            rng_seed: None,
            log_level: "info".to_string(),
            price_alerts: Vec::new(),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        _ => Ok(None),
    }
}

/// Parse `SOLF>0.00002,LBOT<0.000005`. Empty entries are ignored.
pub fn parse_price_alerts(raw: &str) -> Result<Vec<PriceAlert>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PriceAlert::from_str)
        .collect()
}

impl XelionConfig {
    /// Defaults overridden by `XELION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "XELION_TICK_INTERVAL_MS")? {
            config.tick_interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_REFRESH_INTERVAL_MS")? {
            config.refresh_interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_LAUNCH_POLL_INTERVAL_MS")? {
            config.launch_poll_interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_MIN_POTENTIAL_SCORE")? {
            config.min_potential_score = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_PRICE_ALERT_INTERVAL_MS")? {
            config.price_alert_interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_WHALE_ALERT_PROBABILITY")? {
            config.whale_alert_probability = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_LAUNCH_API_URL")? {
            config.launch_api_base_url = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_HTTP_RETRY_ATTEMPTS")? {
            config.http_retry_attempts = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_HTTP_TIMEOUT_SECS")? {
            config.http_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_RATE_LIMIT_PER_SECOND")? {
            config.rate_limit_per_second = v;
        }
        if let Some(v) = parse_var(&lookup, "XELION_DATABASE_URL")? {
            config.database_url = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "XELION_RNG_SEED")? {
            config.rng_seed = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "XELION_LOG_LEVEL")? {
            config.log_level = v;
        }
        if let Some(raw) = lookup("XELION_PRICE_ALERTS") {
            config.price_alerts = parse_price_alerts(&raw).context("XELION_PRICE_ALERTS is invalid")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.tick_interval_ms > 0, "tick interval must be at least 1ms");
        ensure!(self.refresh_interval_ms > 0, "refresh interval must be at least 1ms");
        ensure!(self.launch_poll_interval_ms > 0, "launch poll interval must be at least 1ms");
        ensure!(self.price_alert_interval_ms > 0, "price alert interval must be at least 1ms");
        ensure!(self.rate_limit_per_second > 0, "rate limit must be positive");
        self.simulator_config().validate()?;
        self.tracing_level()?;
        Ok(())
    }

    pub fn tracing_level(&self) -> Result<Level> {
        Level::from_str(&self.log_level).map_err(|_| anyhow!("unknown log level '{}'", self.log_level))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn price_alert_interval(&self) -> Duration {
        Duration::from_millis(self.price_alert_interval_ms)
    }

    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            tick_interval: self.tick_interval(),
            whale_alert_probability: self.whale_alert_probability,
            ..SimulatorConfig::default()
        }
    }

    pub fn http_source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            base_url: self.launch_api_base_url.clone(),
            retry_attempts: self.http_retry_attempts,
            timeout: Duration::from_secs(self.http_timeout_secs),
            requests_per_second: self.rate_limit_per_second,
        }
    }

    pub fn launch_tracker_config(&self) -> LaunchTrackerConfig {
        LaunchTrackerConfig {
            poll_interval: Duration::from_millis(self.launch_poll_interval_ms),
            min_potential_score: self.min_potential_score,
        }
    }
}

/// Fluent construction of [`XelionConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: XelionConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interval settings keep whole milliseconds. Anything under 1ms truncates
    /// to zero and fails [`build`](Self::build); oversized values saturate.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval_ms = duration_millis(interval);
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.refresh_interval_ms = duration_millis(interval);
        self
    }

    pub fn with_launch_poll_interval(mut self, interval: Duration) -> Self {
        self.config.launch_poll_interval_ms = duration_millis(interval);
        self
    }

    pub fn with_min_potential_score(mut self, score: f64) -> Self {
        self.config.min_potential_score = score;
        self
    }

    pub fn with_price_alert_interval(mut self, interval: Duration) -> Self {
        self.config.price_alert_interval_ms = duration_millis(interval);
        self
    }

    pub fn with_whale_alert_probability(mut self, probability: f64) -> Self {
        self.config.whale_alert_probability = probability;
        self
    }

    pub fn with_launch_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.launch_api_base_url = url.into();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    pub fn with_price_alert(mut self, alert: PriceAlert) -> Self {
        self.config.price_alerts.push(alert);
        self
    }

    /// Finish, rejecting inconsistent settings.
    pub fn build(self) -> Result<XelionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertCondition;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = XelionConfig::default();

        assert_eq!(config.tick_interval(), Duration::from_millis(1000));
        assert_eq!(config.refresh_interval(), Duration::from_millis(5000));
        assert_eq!(config.price_alert_interval(), Duration::from_secs(60));
        assert_eq!(config.launch_tracker_config().poll_interval, Duration::from_secs(300));
        assert_eq!(config.min_potential_score, 70.0);
        assert_eq!(config.whale_alert_probability, 0.30);
        assert!(config.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = XelionConfig::from_lookup(lookup_from(&[
            ("XELION_TICK_INTERVAL_MS", "250"),
            ("XELION_RNG_SEED", "42"),
            ("XELION_DATABASE_URL", "sqlite::memory:"),
            ("XELION_LOG_LEVEL", "debug"),
            ("XELION_PRICE_ALERTS", "SOLF>0.00002, lbot<0.000005"),
        ]))
        .unwrap();

        assert_eq!(config.tick_interval_ms, 250);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.tracing_level().unwrap(), Level::DEBUG);
        assert_eq!(config.price_alerts.len(), 2);
        assert_eq!(config.price_alerts[1].symbol, "LBOT");
        assert_eq!(config.price_alerts[1].condition, AlertCondition::Below);
        // Untouched fields keep their defaults
        assert_eq!(config.refresh_interval_ms, 5000);
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let err = XelionConfig::from_lookup(lookup_from(&[("XELION_TICK_INTERVAL_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("XELION_TICK_INTERVAL_MS"));

        let err = XelionConfig::from_lookup(lookup_from(&[("XELION_PRICE_ALERTS", "SOLF=1")]))
            .unwrap_err();
        assert!(err.to_string().contains("XELION_PRICE_ALERTS"));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(XelionConfig::from_lookup(lookup_from(&[("XELION_TICK_INTERVAL_MS", "0")])).is_err());
        assert!(
            XelionConfig::from_lookup(lookup_from(&[("XELION_WHALE_ALERT_PROBABILITY", "2")])).is_err()
        );
        assert!(XelionConfig::from_lookup(lookup_from(&[("XELION_LOG_LEVEL", "chatty")])).is_err());
    }

    #[test]
    fn test_builder() {
        let config = ConfigBuilder::new()
            .with_tick_interval(Duration::from_millis(100))
            .with_rng_seed(7)
            .with_price_alert(PriceAlert::new("SOLF", 1.0, AlertCondition::Above))
            .build()
            .unwrap();

        assert_eq!(config.simulator_config().tick_interval, Duration::from_millis(100));
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.price_alerts.len(), 1);

        assert!(ConfigBuilder::new().with_whale_alert_probability(-0.1).build().is_err());
    }

    #[test]
    fn test_builder_interval_precision() {
        let err = ConfigBuilder::new()
            .with_tick_interval(Duration::from_micros(500))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("1ms"), "{}", err);

        let err = ConfigBuilder::new()
            .with_price_alert_interval(Duration::from_nanos(999_999))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("price alert interval"), "{}", err);

        let config = ConfigBuilder::new()
            .with_refresh_interval(Duration::from_micros(2_700))
            .with_launch_poll_interval(Duration::MAX)
            .build()
            .unwrap();
        assert_eq!(config.refresh_interval_ms, 2);
        assert_eq!(config.launch_poll_interval_ms, u64::MAX);
    }
}
