//! Polling interval table.
//!
//! Four levels of interval overrides, all in milliseconds: a global
//! default plus per-sport, per-league and per-match tables. The table is
//! replaced wholesale or merged one table at a time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lowest interval the bootstrap layer accepts. The scheduler itself never
/// clamps, so anything that reaches it below this floor is used as-is.
pub const MIN_INTERVAL_MS: u64 = 1_000;

/// Global default used when a table has nothing more specific.
pub const DEFAULT_INTERVAL_MS: u64 = 10_000;

/// Four-level interval table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(rename = "default")]
    pub default_ms: u64,
    #[serde(default)]
    pub sport: HashMap<String, u64>,
    #[serde(default)]
    pub league: HashMap<String, u64>,
    #[serde(default, rename = "match")]
    pub matches: HashMap<String, u64>,
}

/// Partial table applied with [`PollingConfig::merge`].
///
/// Keys present in a patch table overwrite the same key in the live
/// table; keys absent from the patch are retained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfigPatch {
    #[serde(default, rename = "default")]
    pub default_ms: Option<u64>,
    #[serde(default)]
    pub sport: HashMap<String, u64>,
    #[serde(default)]
    pub league: HashMap<String, u64>,
    #[serde(default, rename = "match")]
    pub matches: HashMap<String, u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_ms: DEFAULT_INTERVAL_MS,
            sport: HashMap::new(),
            league: HashMap::new(),
            matches: HashMap::new(),
        }
    }
}

impl PollingConfig {
    pub fn new(default_ms: u64) -> Self {
        Self {
            default_ms,
            ..Self::default()
        }
    }

    pub fn with_sport(mut self, sport: impl Into<String>, interval_ms: u64) -> Self {
        self.sport.insert(sport.into(), interval_ms);
        self
    }

    pub fn with_league(mut self, league: impl Into<String>, interval_ms: u64) -> Self {
        self.league.insert(league.into(), interval_ms);
        self
    }

    pub fn with_match(mut self, match_id: impl Into<String>, interval_ms: u64) -> Self {
        self.matches.insert(match_id.into(), interval_ms);
        self
    }

    /// Table-level deep merge.
    pub fn merge(&mut self, patch: PollingConfigPatch) {
        if let Some(default_ms) = patch.default_ms {
            self.default_ms = default_ms;
        }
        self.sport.extend(patch.sport);
        self.league.extend(patch.league);
        self.matches.extend(patch.matches);
    }

    /// Every configured interval, with a label naming where it came from.
    pub fn entries(&self) -> impl Iterator<Item = (String, u64)> + '_ {
        std::iter::once(("default".to_string(), self.default_ms))
            .chain(self.sport.iter().map(|(k, v)| (format!("sport.{k}"), *v)))
            .chain(self.league.iter().map(|(k, v)| (format!("league.{k}"), *v)))
            .chain(self.matches.iter().map(|(k, v)| (format!("match.{k}"), *v)))
    }

    /// Reject any interval below `floor_ms`.
    pub fn validate(&self, floor_ms: u64) -> Result<(), String> {
        for (label, value) in self.entries() {
            if value < floor_ms {
                return Err(format!(
                    "polling interval {label} = {value}ms is below the {floor_ms}ms floor"
                ));
            }
        }
        Ok(())
    }
}
