//! Reading and aggregate types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Match state as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Halftime,
    Finished,
    Postponed,
    Cancelled,
}

/// One provider's snapshot of a match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveScore {
    /// Stamped by the [`Provider`](crate::providers::Provider) that produced it.
    #[serde(default)]
    pub provider_id: String,
    pub match_id: String,
    pub sport: String,
    #[serde(default)]
    pub league: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    #[serde(default)]
    pub period: Option<String>,
    pub status: MatchStatus,
    pub timestamp: DateTime<Utc>,
}

impl LiveScore {
    pub fn score(&self) -> (u32, u32) {
        (self.home_score, self.away_score)
    }
}

/// One provider's quote for a single market selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOdds {
    #[serde(default)]
    pub provider_id: String,
    /// Provider-side identifier of the quote.
    pub id: String,
    pub event_id: String,
    pub market_type: String,
    pub selection: String,
    /// Decimal odds.
    pub odds: f64,
    pub timestamp: DateTime<Utc>,
}

/// Merged cross-provider score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedScore {
    pub key: String,
    pub match_id: String,
    pub sport: String,
    pub league: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    pub period: Option<String>,
    pub status: MatchStatus,
    pub timestamp: DateTime<Utc>,
    /// Provider ids in the order their readings were merged.
    pub sources: Vec<String>,
    pub confidence: f64,
}

/// A single provider's odds retained inside a market aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuote {
    pub provider_id: String,
    pub odds: f64,
}

/// Merged cross-provider market.
///
/// `provider_id`, `market_id` and `odds` always describe the highest-odds
/// quote seen; `best_odds` and `average_odds` summarise every quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMarket {
    pub event_id: String,
    pub market_type: String,
    pub selection: String,
    pub provider_id: String,
    pub market_id: String,
    pub odds: f64,
    pub timestamp: DateTime<Utc>,
    pub best_odds: f64,
    pub average_odds: f64,
    pub quotes: Vec<SourceQuote>,
    pub sources: Vec<String>,
    pub confidence: f64,
}
