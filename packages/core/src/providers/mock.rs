//! In-memory feed source.
//!
//! Serves canned readings, optionally after a delay or with an injected
//! error, and counts calls and overlapping requests. Used by the test
//! suites and for dry runs without a live upstream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::aggregation::types::{LiveScore, MarketOdds, MatchStatus};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::source::{FeedSource, FetchParams};

#[derive(Default)]
pub struct MockFeedSource {
    name: String,
    scores: Mutex<Vec<LiveScore>>,
    markets: Mutex<Vec<MarketOdds>>,
    error: Mutex<Option<ProviderError>>,
    delay: Option<Duration>,
    panic_on_fetch: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Decrements the in-flight counter even when the request is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockFeedSource {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_scores(self, scores: Vec<LiveScore>) -> Self {
        *locked(&self.scores) = scores;
        self
    }

    pub fn with_markets(self, markets: Vec<MarketOdds>) -> Self {
        *locked(&self.markets) = markets;
        self
    }

    pub fn with_error(self, error: ProviderError) -> Self {
        *locked(&self.error) = Some(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panic inside every fetch, to exercise the scheduler's task boundary.
    pub fn panicking(mut self) -> Self {
        self.panic_on_fetch = true;
        self
    }

    pub fn set_error(&self, error: ProviderError) {
        *locked(&self.error) = Some(error);
    }

    pub fn clear_error(&self) {
        *locked(&self.error) = None;
    }

    pub fn set_scores(&self, scores: Vec<LiveScore>) {
        *locked(&self.scores) = scores;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were ever in progress at once.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn sample_score(home: &str, away: &str, home_score: u32, away_score: u32) -> LiveScore {
        LiveScore {
            provider_id: String::new(),
            match_id: format!("{}-{}", home.to_lowercase(), away.to_lowercase()),
            sport: "basketball".to_string(),
            league: Some("nba".to_string()),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score,
            away_score,
            period: Some("Q4".to_string()),
            status: MatchStatus::Live,
            timestamp: Utc::now(),
        }
    }

    pub fn sample_market(event_id: &str, selection: &str, odds: f64) -> MarketOdds {
        MarketOdds {
            provider_id: String::new(),
            id: format!("{event_id}-{selection}"),
            event_id: event_id.to_string(),
            market_type: "moneyline".to_string(),
            selection: selection.to_string(),
            odds,
            timestamp: Utc::now(),
        }
    }

    async fn begin(&self) -> ProviderResult<InFlight<'_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_fetch {
            panic!("mock feed source {} panicked", self.name);
        }
        if let Some(err) = locked(&self.error).clone() {
            return Err(err);
        }
        Ok(guard)
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn fetch_live_scores(&self, _params: &FetchParams) -> ProviderResult<Vec<LiveScore>> {
        let _guard = self.begin().await?;
        Ok(locked(&self.scores).clone())
    }

    async fn fetch_markets(&self, _params: &FetchParams) -> ProviderResult<Vec<MarketOdds>> {
        let _guard = self.begin().await?;
        Ok(locked(&self.markets).clone())
    }

    async fn health_check(&self) -> ProviderResult<()> {
        match locked(&self.error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
