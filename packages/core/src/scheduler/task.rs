//! Polling task state.
//!
//! A task is Idle or Running; there is no failed state. The running flag
//! is an atomic compare-and-set so no task ever overlaps with itself,
//! whatever thread the tick runs on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::aggregation::types::{AggregatedMarket, AggregatedScore};
use crate::delivery::DeliveryCallback;
use crate::providers::{FetchParams, Provider};

/// What a task fetches, and where its merged output goes.
#[derive(Clone)]
pub enum TaskKind {
    LiveScores(Arc<dyn DeliveryCallback<AggregatedScore>>),
    Markets(Arc<dyn DeliveryCallback<AggregatedMarket>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    LiveScores,
    Markets,
}

impl TaskKind {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskKind::LiveScores(_) => TaskType::LiveScores,
            TaskKind::Markets(_) => TaskType::Markets,
        }
    }
}

/// Why one provider contributed nothing to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub reason: String,
}

/// Outcome of fanning a fetch out across a task's providers.
#[derive(Debug, Clone)]
pub struct FanOutResult<T> {
    /// Readings from every provider that answered, in provider order.
    pub readings: Vec<T>,
    pub succeeded: Vec<String>,
    /// Providers left out because they were down or disabled.
    pub skipped: Vec<String>,
    pub failures: Vec<ProviderFailure>,
}

impl<T> FanOutResult<T> {
    pub fn new() -> Self {
        Self {
            readings: Vec::new(),
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Default for FanOutResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// What the last run left behind for status reporting.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunReport {
    pub failures: Vec<ProviderFailure>,
    pub skipped: Vec<String>,
}

#[derive(Debug)]
struct Schedule {
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
    next_run: Instant,
    run_count: u64,
    last_report: RunReport,
}

/// Point-in-time view of a task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub id: String,
    pub kind: TaskType,
    pub interval_ms: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub running: bool,
    pub providers: Vec<String>,
    pub run_count: u64,
    pub last_failures: Vec<ProviderFailure>,
    pub skipped_providers: Vec<String>,
}

pub struct PollingTask {
    pub(crate) id: String,
    pub(crate) kind: TaskKind,
    pub(crate) providers: Vec<Arc<Provider>>,
    pub(crate) params: FetchParams,
    running: AtomicBool,
    schedule: Mutex<Schedule>,
}

/// Map a monotonic instant onto the wall clock.
fn wall_clock(at: Instant) -> DateTime<Utc> {
    let now = Instant::now();
    let wall_now = Utc::now();
    if at >= now {
        chrono::Duration::from_std(at - now)
            .map(|ahead| wall_now + ahead)
            .unwrap_or(wall_now)
    } else {
        chrono::Duration::from_std(now - at)
            .map(|behind| wall_now - behind)
            .unwrap_or(wall_now)
    }
}

impl PollingTask {
    /// New tasks are due immediately.
    pub(crate) fn new(
        id: String,
        kind: TaskKind,
        providers: Vec<Arc<Provider>>,
        params: FetchParams,
        interval: Duration,
    ) -> Self {
        Self {
            id,
            kind,
            providers,
            params,
            running: AtomicBool::new(false),
            schedule: Mutex::new(Schedule {
                interval,
                last_run: None,
                next_run: Instant::now(),
                run_count: 0,
                last_report: RunReport::default(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) async fn is_due(&self, now: Instant) -> bool {
        self.schedule.lock().await.next_run <= now
    }

    /// Idle -> Running if `next_run` is due at `now`. The due check and the
    /// flag flip happen under the schedule lock, the same lock `finish`
    /// holds while it reschedules and clears the flag.
    pub(crate) async fn try_fire(&self, now: Instant) -> bool {
        let schedule = self.schedule.lock().await;
        if schedule.next_run > now {
            return false;
        }
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) async fn mark_started(&self) {
        self.schedule.lock().await.last_run = Some(Utc::now());
    }

    /// Running -> Idle, rescheduled with whatever interval is current now.
    pub(crate) async fn finish(&self, report: RunReport) {
        let mut schedule = self.schedule.lock().await;
        schedule.next_run = Instant::now() + schedule.interval;
        schedule.run_count += 1;
        schedule.last_report = report;
        self.running.store(false, Ordering::SeqCst);
    }

    /// Takes effect relative to the update, not the last natural fire.
    pub(crate) async fn set_interval(&self, interval: Duration) {
        let mut schedule = self.schedule.lock().await;
        schedule.interval = interval;
        schedule.next_run = Instant::now() + interval;
    }

    pub async fn interval(&self) -> Duration {
        self.schedule.lock().await.interval
    }

    pub async fn status(&self) -> TaskStatus {
        let schedule = self.schedule.lock().await;
        TaskStatus {
            id: self.id.clone(),
            kind: self.kind.task_type(),
            interval_ms: schedule.interval.as_millis() as u64,
            last_run: schedule.last_run,
            next_run: wall_clock(schedule.next_run),
            running: self.is_running(),
            providers: self.providers.iter().map(|p| p.id().to_string()).collect(),
            run_count: schedule.run_count,
            last_failures: schedule.last_report.failures.clone(),
            skipped_providers: schedule.last_report.skipped.clone(),
        }
    }
}
