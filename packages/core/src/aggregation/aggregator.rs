//! Cross-provider merge.
//!
//! Both merges are single-pass over the input and keep first-appearance
//! order. Disagreement between providers is never rejected; it only
//! lowers the confidence of the aggregate.

use std::collections::HashMap;

use crate::aggregation::types::{
    AggregatedMarket, AggregatedScore, LiveScore, MarketOdds, SourceQuote,
};

/// Odds differing by less than this many percent count as agreement.
const ODDS_TOLERANCE_PCT: f64 = 5.0;

/// Lowercase and drop everything that is not alphanumeric.
pub fn normalize_team(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Grouping key for a score reading.
pub fn score_key(reading: &LiveScore) -> String {
    format!(
        "{}:{}:{}",
        reading.sport,
        normalize_team(&reading.home_team),
        normalize_team(&reading.away_team)
    )
}

fn score_confidence(agrees: bool, source_count: usize) -> f64 {
    let n = source_count as f64;
    if agrees {
        (0.5 + n * 0.15).min(1.0)
    } else {
        (1.0 - n * 0.1).max(0.3)
    }
}

fn odds_confidence(diff_pct: f64, source_count: usize) -> f64 {
    if diff_pct < ODDS_TOLERANCE_PCT {
        (0.6 + source_count as f64 * 0.1).min(1.0)
    } else {
        (1.0 - diff_pct * 2.0).max(0.4)
    }
}

/// Merge score readings from any number of providers.
///
/// The newest reading by timestamp supplies score, period and status;
/// provider priority plays no part.
pub fn merge_live_scores(readings: &[LiveScore]) -> Vec<AggregatedScore> {
    let mut merged: Vec<AggregatedScore> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for reading in readings {
        let key = score_key(reading);

        let Some(&slot) = index.get(&key) else {
            index.insert(key.clone(), merged.len());
            merged.push(AggregatedScore {
                key,
                match_id: reading.match_id.clone(),
                sport: reading.sport.clone(),
                league: reading.league.clone(),
                home_team: reading.home_team.clone(),
                away_team: reading.away_team.clone(),
                home_score: reading.home_score,
                away_score: reading.away_score,
                period: reading.period.clone(),
                status: reading.status.clone(),
                timestamp: reading.timestamp,
                sources: vec![reading.provider_id.clone()],
                confidence: 1.0,
            });
            continue;
        };

        let aggregate = &mut merged[slot];
        aggregate.sources.push(reading.provider_id.clone());

        // Compared against the aggregate as it stood before this reading.
        let agrees = reading.score() == (aggregate.home_score, aggregate.away_score);

        if reading.timestamp > aggregate.timestamp {
            aggregate.home_score = reading.home_score;
            aggregate.away_score = reading.away_score;
            aggregate.period = reading.period.clone();
            aggregate.status = reading.status.clone();
            aggregate.timestamp = reading.timestamp;
        }

        aggregate.confidence = score_confidence(agrees, aggregate.sources.len());
    }

    merged
}

/// Merge market quotes keyed by (event, market type, selection).
pub fn merge_markets(readings: &[MarketOdds]) -> Vec<AggregatedMarket> {
    let mut merged: Vec<AggregatedMarket> = Vec::new();
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();

    for reading in readings {
        let key = (
            reading.event_id.clone(),
            reading.market_type.clone(),
            reading.selection.clone(),
        );

        let Some(&slot) = index.get(&key) else {
            index.insert(key, merged.len());
            merged.push(AggregatedMarket {
                event_id: reading.event_id.clone(),
                market_type: reading.market_type.clone(),
                selection: reading.selection.clone(),
                provider_id: reading.provider_id.clone(),
                market_id: reading.id.clone(),
                odds: reading.odds,
                timestamp: reading.timestamp,
                best_odds: reading.odds,
                average_odds: reading.odds,
                quotes: vec![SourceQuote {
                    provider_id: reading.provider_id.clone(),
                    odds: reading.odds,
                }],
                sources: vec![reading.provider_id.clone()],
                confidence: 1.0,
            });
            continue;
        };

        let aggregate = &mut merged[slot];
        aggregate.sources.push(reading.provider_id.clone());
        aggregate.quotes.push(SourceQuote {
            provider_id: reading.provider_id.clone(),
            odds: reading.odds,
        });

        aggregate.best_odds = aggregate
            .quotes
            .iter()
            .map(|q| q.odds)
            .fold(f64::MIN, f64::max);
        aggregate.average_odds =
            aggregate.quotes.iter().map(|q| q.odds).sum::<f64>() / aggregate.quotes.len() as f64;

        let diff_pct = if aggregate.odds > 0.0 {
            (reading.odds - aggregate.odds).abs() / aggregate.odds * 100.0
        } else {
            0.0
        };

        if reading.odds > aggregate.odds {
            aggregate.provider_id = reading.provider_id.clone();
            aggregate.market_id = reading.id.clone();
            aggregate.odds = reading.odds;
            aggregate.timestamp = reading.timestamp;
        }

        aggregate.confidence = odds_confidence(diff_pct, aggregate.sources.len());
    }

    merged
}
