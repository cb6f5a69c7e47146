//! Polling cadence: the interval table and its specificity resolver.

pub mod config;
pub mod interval;

pub use config::{PollingConfig, PollingConfigPatch, DEFAULT_INTERVAL_MS, MIN_INTERVAL_MS};
pub use interval::{resolve_interval, IntervalTarget};
