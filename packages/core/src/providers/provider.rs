//! A configured provider: one [`FeedSource`] plus its identity, its timeout
//! and the health record it maintains about itself.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::aggregation::types::{LiveScore, MarketOdds};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::health::{HealthTracker, ProviderHealth};
use crate::providers::source::{FeedSource, FetchParams};

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_enabled() -> bool {
    true
}

/// Static provider settings.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lower sorts first in health listings. Plays no part in merging.
    #[serde(default)]
    pub priority: u8,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            enabled: true,
            priority: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_ms", &self.timeout_ms)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Call {
    Fetch,
    HealthCheck,
}

pub struct Provider {
    config: ProviderConfig,
    source: Arc<dyn FeedSource>,
    health: RwLock<HealthTracker>,
}

impl Provider {
    pub fn new(config: ProviderConfig, source: Arc<dyn FeedSource>) -> Self {
        let health = RwLock::new(HealthTracker::new(config.id.clone()));
        Self {
            config,
            source,
            health,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Copy of the current health record.
    pub async fn health(&self) -> ProviderHealth {
        self.health.read().await.snapshot()
    }

    /// Enabled and not down: eligible for a task's fan-out.
    pub async fn is_available(&self) -> bool {
        self.config.enabled && !self.health.read().await.status().is_down()
    }

    pub async fn fetch_live_scores(&self, params: &FetchParams) -> ProviderResult<Vec<LiveScore>> {
        let mut scores = self.timed(Call::Fetch, self.source.fetch_live_scores(params)).await?;
        for score in &mut scores {
            score.provider_id = self.config.id.clone();
        }
        Ok(scores)
    }

    pub async fn fetch_markets(&self, params: &FetchParams) -> ProviderResult<Vec<MarketOdds>> {
        let mut markets = self.timed(Call::Fetch, self.source.fetch_markets(params)).await?;
        for market in &mut markets {
            market.provider_id = self.config.id.clone();
        }
        Ok(markets)
    }

    /// Time-bounded liveness check. The outcome is recorded like a fetch,
    /// minus the latency sample, so a passing check brings a down provider back.
    pub async fn health_check(&self) -> bool {
        match self.timed(Call::HealthCheck, self.source.health_check()).await {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(provider = %self.config.id, "Health check failed: {}", err);
                false
            }
        }
    }

    /// Run `request` under the provider timeout and record the outcome.
    /// Only fetches feed the response-time window.
    async fn timed<T, F>(&self, call: Call, request: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        if !self.config.enabled {
            return Err(ProviderError::Disabled);
        }

        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.config.timeout(), request).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }),
        };

        let mut health = self.health.write().await;
        match &outcome {
            Ok(_) => match call {
                Call::Fetch => health.record_success(started.elapsed()),
                Call::HealthCheck => health.record_check_success(),
            },
            Err(err) => {
                health.record_failure();
                tracing::warn!(
                    provider = %self.config.id,
                    status = ?health.status(),
                    "Fetch failed: {}",
                    err
                );
            }
        }

        outcome
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("config", &self.config)
            .field("source", &self.source.source_name())
            .finish()
    }
}
