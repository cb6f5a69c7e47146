//! REST Feed Source
//!
//! Implements [`FeedSource`] against a JSON-over-HTTP sports data API:
//!
//! - `GET {endpoint}/scores?sport=&league=&match_ids=a,b`
//! - `GET {endpoint}/odds?sport=&league=&event_ids=&market_types=`
//! - `GET {endpoint}/health`
//!
//! Requests carry `Authorization: Bearer <api_key>` when a key is set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::aggregation::types::{LiveScore, MarketOdds, MatchStatus};
use crate::providers::{
    error::{ProviderError, ProviderResult},
    provider::ProviderConfig,
    source::{FeedSource, FetchParams},
};

#[derive(Clone)]
pub struct HttpFeedSource {
    name: String,
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ScoresResponse {
    scores: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OddsResponse {
    markets: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ScoreRecord {
    match_id: String,
    sport: String,
    #[serde(default)]
    league: Option<String>,
    home_team: String,
    away_team: String,
    home_score: u32,
    away_score: u32,
    #[serde(default)]
    period: Option<String>,
    status: MatchStatus,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct MarketRecord {
    id: String,
    event_id: String,
    market_type: String,
    selection: String,
    odds: f64,
    updated_at: String,
}

fn parse_timestamp(raw: &str) -> ProviderResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ProviderError::format(format!("Invalid timestamp '{}': {}", raw, e)))
}

impl ScoreRecord {
    fn into_reading(self) -> ProviderResult<LiveScore> {
        Ok(LiveScore {
            provider_id: String::new(),
            timestamp: parse_timestamp(&self.updated_at)?,
            match_id: self.match_id,
            sport: self.sport,
            league: self.league,
            home_team: self.home_team,
            away_team: self.away_team,
            home_score: self.home_score,
            away_score: self.away_score,
            period: self.period,
            status: self.status,
        })
    }
}

impl MarketRecord {
    fn into_reading(self) -> ProviderResult<MarketOdds> {
        if !self.odds.is_finite() || self.odds <= 1.0 {
            return Err(ProviderError::format(format!(
                "Invalid decimal odds {} for market {}",
                self.odds, self.id
            )));
        }
        Ok(MarketOdds {
            provider_id: String::new(),
            timestamp: parse_timestamp(&self.updated_at)?,
            id: self.id,
            event_id: self.event_id,
            market_type: self.market_type,
            selection: self.selection,
            odds: self.odds,
        })
    }
}

impl HttpFeedSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: base_url.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            http: Client::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut source = Self::new(config.endpoint.clone());
        source.name = config.id.clone();
        source.api_key = config.api_key.clone();
        source
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> ProviderResult<Response> {
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self.http.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("Failed to fetch {}: {}", path, e)))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::auth(format!(
                "{} rejected credentials (HTTP {})",
                self.name,
                response.status()
            ))),
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimitExceeded),
            StatusCode::SERVICE_UNAVAILABLE => Err(ProviderError::ServiceUnavailable),
            status => Err(ProviderError::network(format!(
                "{} returned HTTP {}",
                self.name, status
            ))),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<T> {
        self.get(path, query)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ProviderError::format(format!("Failed to parse {} response: {}", path, e)))
    }

    fn common_query(params: &FetchParams) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(sport) = &params.sport {
            query.push(("sport", sport.clone()));
        }
        if let Some(league) = &params.league {
            query.push(("league", league.clone()));
        }
        query
    }

    /// Decode records one by one, skipping the ones that do not parse.
    fn decode_records<R, T>(
        &self,
        raw: Vec<serde_json::Value>,
        convert: impl Fn(R) -> ProviderResult<T>,
    ) -> Vec<T>
    where
        R: DeserializeOwned,
    {
        let mut readings = Vec::with_capacity(raw.len());
        for value in raw {
            let decoded = serde_json::from_value::<R>(value)
                .map_err(|e| ProviderError::format(e.to_string()))
                .and_then(&convert);
            match decoded {
                Ok(reading) => readings.push(reading),
                Err(e) => {
                    tracing::warn!(source = %self.name, "Skipping malformed record: {}", e);
                }
            }
        }
        readings
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_live_scores(&self, params: &FetchParams) -> ProviderResult<Vec<LiveScore>> {
        let mut query = Self::common_query(params);
        if !params.match_ids.is_empty() {
            query.push(("match_ids", params.match_ids.join(",")));
        }

        let response: ScoresResponse = self.get_json("scores", &query).await?;
        Ok(self.decode_records(response.scores, ScoreRecord::into_reading))
    }

    async fn fetch_markets(&self, params: &FetchParams) -> ProviderResult<Vec<MarketOdds>> {
        let mut query = Self::common_query(params);
        if !params.event_ids.is_empty() {
            query.push(("event_ids", params.event_ids.join(",")));
        }
        if !params.market_types.is_empty() {
            query.push(("market_types", params.market_types.join(",")));
        }

        let response: OddsResponse = self.get_json("odds", &query).await?;
        Ok(self.decode_records(response.markets, MarketRecord::into_reading))
    }

    async fn health_check(&self) -> ProviderResult<()> {
        self.get("health", &[]).await.map(|_| ())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
