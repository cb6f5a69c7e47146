//! Feed Source Interface
//!
//! Abstraction over a single upstream sports data API. A source only knows
//! how to talk to its upstream; timeouts, health bookkeeping and provider
//! identity are layered on top by [`Provider`](super::Provider).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::aggregation::types::{LiveScore, MarketOdds};
use crate::providers::error::ProviderResult;

/// What a task asks its providers for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub match_ids: Vec<String>,
    #[serde(default)]
    pub event_ids: Vec<String>,
    #[serde(default)]
    pub market_types: Vec<String>,
}

impl FetchParams {
    pub fn for_sport(sport: impl Into<String>) -> Self {
        Self {
            sport: Some(sport.into()),
            ..Self::default()
        }
    }

    pub fn with_league(mut self, league: impl Into<String>) -> Self {
        self.league = Some(league.into());
        self
    }

    pub fn with_match(mut self, match_id: impl Into<String>) -> Self {
        self.match_ids.push(match_id.into());
        self
    }
}

/// Trait for upstream feeds to ensure data source independence
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_live_scores(&self, params: &FetchParams) -> ProviderResult<Vec<LiveScore>>;

    async fn fetch_markets(&self, params: &FetchParams) -> ProviderResult<Vec<MarketOdds>>;

    /// Liveness probe. Defaults to an unfiltered score fetch.
    async fn health_check(&self) -> ProviderResult<()> {
        self.fetch_live_scores(&FetchParams::default())
            .await
            .map(|_| ())
    }

    /// Name of this source for logging/debugging
    fn source_name(&self) -> &str;
}
