//! Data Aggregation Module
//!
//! Merges readings of the same real-world entity reported by several
//! providers into one best-available value carrying provenance and a
//! confidence score.

pub mod aggregator;
pub mod types;

mod tests;

pub use aggregator::{merge_live_scores, merge_markets, normalize_team, score_key};
pub use types::*;
