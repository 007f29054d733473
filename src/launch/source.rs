//! Launch feeds.
//!
//! [`PumpFunLaunchSource`] is the HTTP feed. Requests are rate limited with
//! governor and retried with exponential backoff.

use crate::launch::types::{parse_launch_payload, TokenLaunch};
use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument};

/// Anything that can list upcoming launches.
#[async_trait]
pub trait LaunchSource: Send + Sync {
    /// Fetch the current list of announced launches.
    async fn fetch_upcoming(&self) -> Result<Vec<TokenLaunch>>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// HTTP settings for [`PumpFunLaunchSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub base_url: String,
    pub retry_attempts: usize,
    pub timeout: Duration,
    pub requests_per_second: u32,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pump.fun/v1".to_string(),
            retry_attempts: 3,
            timeout: Duration::from_secs(10),
            requests_per_second: 5,
        }
    }
}

pub struct PumpFunLaunchSource {
    client: Client,
    config: HttpSourceConfig,
    limiter: DefaultDirectRateLimiter,
}

impl PumpFunLaunchSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    fn upcoming_url(&self) -> String {
        format!("{}/tokens/upcoming", self.config.base_url.trim_end_matches('/'))
    }

    async fn fetch_once(&self) -> Result<Vec<TokenLaunch>> {
        self.limiter.until_ready().await;

        let url = self.upcoming_url();
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .context("Launch feed returned an error status")?
            .text()
            .await
            .context("Failed to read launch feed body")?;

        parse_launch_payload(&body)
    }
}

#[async_trait]
impl LaunchSource for PumpFunLaunchSource {
    #[instrument(skip(self))]
    async fn fetch_upcoming(&self) -> Result<Vec<TokenLaunch>> {
        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .take(self.config.retry_attempts);

        let launches = Retry::spawn(retry_strategy, || self.fetch_once()).await?;
        debug!("Fetched {} launches from {}", launches.len(), self.config.base_url);
        Ok(launches)
    }

    fn name(&self) -> &str {
        "pump.fun"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upcoming_url_normalizes_trailing_slash() {
        let source = PumpFunLaunchSource::new(HttpSourceConfig {
            base_url: "http://localhost:9/v1/".to_string(),
            ..HttpSourceConfig::default()
        })
        .unwrap();

        assert_eq!(source.upcoming_url(), "http://localhost:9/v1/tokens/upcoming");
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_error() {
        let source = PumpFunLaunchSource::new(HttpSourceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            retry_attempts: 1,
            timeout: Duration::from_millis(200),
            requests_per_second: 10,
        })
        .unwrap();

        assert!(source.fetch_upcoming().await.is_err());
    }
}
