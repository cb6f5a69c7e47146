//! Provider health tracking.
//!
//! `HealthTracker` is the live, mutable record owned by a single
//! [`Provider`](super::Provider). Callers only ever see a
//! [`ProviderHealth`] snapshot, which is a plain value copied out of the
//! tracker.
//!
//! Response times are kept in a bounded window: when the window is full
//! the oldest sample is evicted before the new one is inserted
//! (ring-buffer semantics backed by `VecDeque`).

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of response-time samples retained.
pub const DEFAULT_WINDOW: usize = 100;

/// Failure streak above which a provider is down.
const DOWN_AFTER: u32 = 3;
/// Failure streak above which a provider is degraded.
const DEGRADED_AFTER: u32 = 1;
/// Error rate above which a provider is degraded.
const DEGRADED_ERROR_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

impl HealthStatus {
    /// Threshold ladder applied after a failure.
    pub fn from_failure_streak(consecutive_failures: u32) -> Self {
        if consecutive_failures > DOWN_AFTER {
            HealthStatus::Down
        } else if consecutive_failures > DEGRADED_AFTER {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn from_error_rate(error_rate: f64) -> Self {
        if error_rate > DEGRADED_ERROR_RATE {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self, HealthStatus::Down)
    }
}

/// Immutable copy of a provider's health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub status: HealthStatus,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub avg_response_time_ms: f64,
    pub sample_count: usize,
    pub error_rate: f64,
    pub total_successes: u64,
    pub total_failures: u64,
}

/// Live health record for one provider.
#[derive(Debug)]
pub struct HealthTracker {
    provider_id: String,
    status: HealthStatus,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    response_times: VecDeque<Duration>,
    capacity: usize,
    error_rate: f64,
    total_successes: u64,
    total_failures: u64,
}

impl HealthTracker {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self::with_window(provider_id, DEFAULT_WINDOW)
    }

    pub fn with_window(provider_id: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            provider_id: provider_id.into(),
            status: HealthStatus::Healthy,
            last_success: None,
            last_failure: None,
            consecutive_failures: 0,
            response_times: VecDeque::with_capacity(capacity),
            capacity,
            error_rate: 0.0,
            total_successes: 0,
            total_failures: 0,
        }
    }

    pub fn record_success(&mut self, response_time: Duration) {
        if self.response_times.len() >= self.capacity {
            self.response_times.pop_front();
        }
        self.response_times.push_back(response_time);
        self.mark_success();
    }

    /// A passing health check. Resets the failure streak like a fetch
    /// success but leaves the response-time window to real fetches.
    pub fn record_check_success(&mut self) {
        self.mark_success();
    }

    fn mark_success(&mut self) {
        self.consecutive_failures = 0;
        self.error_rate = Self::error_rate_for(self.consecutive_failures);
        self.status = HealthStatus::from_error_rate(self.error_rate);
        self.last_success = Some(Utc::now());
        self.total_successes += 1;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.status = HealthStatus::from_failure_streak(self.consecutive_failures);
        self.error_rate = Self::error_rate_for(self.consecutive_failures);
        self.last_failure = Some(Utc::now());
        self.total_failures += 1;
    }

    /// Function of the current streak only, not of historical ratio.
    fn error_rate_for(consecutive_failures: u32) -> f64 {
        (consecutive_failures as f64 / 10.0).min(1.0)
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn avg_response_time_ms(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .response_times
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .sum();
        total / self.response_times.len() as f64
    }

    pub fn snapshot(&self) -> ProviderHealth {
        ProviderHealth {
            provider_id: self.provider_id.clone(),
            status: self.status,
            last_success: self.last_success,
            last_failure: self.last_failure,
            consecutive_failures: self.consecutive_failures,
            avg_response_time_ms: self.avg_response_time_ms(),
            sample_count: self.response_times.len(),
            error_rate: self.error_rate,
            total_successes: self.total_successes,
            total_failures: self.total_failures,
        }
    }
}
