//! Interval resolution.
//!
//! Most specific wins: match, then league, then sport, then the global
//! default. Unknown keys fall through silently.

use std::time::Duration;

use crate::polling::config::PollingConfig;
use crate::providers::FetchParams;

/// What a task is polling, as far as interval lookup is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalTarget<'a> {
    pub match_id: Option<&'a str>,
    pub league: Option<&'a str>,
    pub sport: Option<&'a str>,
}

impl<'a> IntervalTarget<'a> {
    /// The match-id level only applies when the task targets exactly one match.
    pub fn from_params(params: &'a FetchParams) -> Self {
        let match_id = match params.match_ids.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        };

        Self {
            match_id,
            league: params.league.as_deref(),
            sport: params.sport.as_deref(),
        }
    }
}

pub fn resolve_interval(target: &IntervalTarget<'_>, config: &PollingConfig) -> Duration {
    let ms = target
        .match_id
        .and_then(|id| config.matches.get(id))
        .or_else(|| target.league.and_then(|league| config.league.get(league)))
        .or_else(|| target.sport.and_then(|sport| config.sport.get(sport)))
        .copied()
        .unwrap_or(config.default_ms);

    Duration::from_millis(ms)
}
