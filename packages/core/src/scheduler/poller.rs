//! Polling scheduler.
//!
//! Owns the registered tasks and drives them from a single fixed-cadence
//! tick. Each tick scans every task and hands the due, idle ones to their
//! own Tokio task, so a slow execution never delays the tick or any other
//! task. Per execution:
//!
//! 1. mark Running and stamp `last_run`
//! 2. skip bound providers that are down or disabled
//! 3. fetch from the rest in parallel; a failed fetch contributes nothing
//! 4. merge the readings that did arrive
//! 5. hand the merge to the delivery callback, logging any error
//! 6. mark Idle and schedule the next run one interval out
//!
//! Nothing in this loop is fatal: provider errors, callback errors and
//! panics are all logged and the task keeps its place in the schedule.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::aggregation::{merge_live_scores, merge_markets, AggregatedMarket, AggregatedScore};
use crate::delivery::DeliveryCallback;
use crate::metrics::AppMetrics;
use crate::polling::{resolve_interval, IntervalTarget, PollingConfig, PollingConfigPatch};
use crate::providers::{FetchParams, Provider, ProviderHealth, ProviderResult};
use crate::scheduler::task::{
    FanOutResult, PollingTask, ProviderFailure, RunReport, TaskKind, TaskStatus,
};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the task table is scanned.
    pub tick_interval: Duration,
    /// How often down providers are probed for recovery.
    pub probe_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            probe_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    #[error("Unknown task: {0}")]
    TaskNotFound(String),

    #[error("Task {0} has no providers")]
    NoProviders(String),
}

struct Shared {
    config: SchedulerConfig,
    tasks: RwLock<HashMap<String, Arc<PollingTask>>>,
    /// Every provider ever registered or bound, keyed by id. Outlives the
    /// tasks that reference it.
    providers: RwLock<HashMap<String, Arc<Provider>>>,
    polling: RwLock<PollingConfig>,
    metrics: Option<Arc<AppMetrics>>,
}

struct Loops {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

pub struct PollingScheduler {
    shared: Arc<Shared>,
    loops: Mutex<Option<Loops>>,
}

impl PollingScheduler {
    pub fn new(polling: PollingConfig, config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                tasks: RwLock::new(HashMap::new()),
                providers: RwLock::new(HashMap::new()),
                polling: RwLock::new(polling),
                metrics: None,
            }),
            loops: Mutex::new(None),
        }
    }

    /// Attach metrics. Must be called before [`start`](Self::start).
    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.metrics = Some(metrics),
            None => tracing::warn!("Scheduler already shared; metrics not attached"),
        }
        self
    }

    pub async fn register_live_score_task(
        &self,
        id: impl Into<String>,
        providers: Vec<Arc<Provider>>,
        params: FetchParams,
        callback: Arc<dyn DeliveryCallback<AggregatedScore>>,
    ) -> Result<(), SchedulerError> {
        self.register(id.into(), TaskKind::LiveScores(callback), providers, params)
            .await
    }

    pub async fn register_market_task(
        &self,
        id: impl Into<String>,
        providers: Vec<Arc<Provider>>,
        params: FetchParams,
        callback: Arc<dyn DeliveryCallback<AggregatedMarket>>,
    ) -> Result<(), SchedulerError> {
        self.register(id.into(), TaskKind::Markets(callback), providers, params)
            .await
    }

    async fn register(
        &self,
        id: String,
        kind: TaskKind,
        providers: Vec<Arc<Provider>>,
        params: FetchParams,
    ) -> Result<(), SchedulerError> {
        if providers.is_empty() {
            return Err(SchedulerError::NoProviders(id));
        }

        let interval = {
            let polling = self.shared.polling.read().await;
            resolve_interval(&IntervalTarget::from_params(&params), &polling)
        };

        let mut tasks = self.shared.tasks.write().await;
        if tasks.contains_key(&id) {
            return Err(SchedulerError::DuplicateTask(id));
        }

        tracing::info!(
            task_id = %id,
            kind = ?kind.task_type(),
            providers = providers.len(),
            "Registered polling task (interval: {}ms)",
            interval.as_millis()
        );

        {
            let mut known = self.shared.providers.write().await;
            for provider in &providers {
                known
                    .entry(provider.id().to_string())
                    .or_insert_with(|| Arc::clone(provider));
            }
        }

        let task = PollingTask::new(id.clone(), kind, providers, params, interval);
        tasks.insert(id, Arc::new(task));

        if let Some(metrics) = &self.shared.metrics {
            metrics.registered_tasks.set(tasks.len() as f64);
        }
        Ok(())
    }

    /// Change a task's interval; the next run is one new interval from now.
    /// An execution already in flight is unaffected.
    pub async fn update_interval(&self, id: &str, interval: Duration) -> Result<(), SchedulerError> {
        let task = self.task(id).await?;
        task.set_interval(interval).await;

        tracing::info!(task_id = %id, "Polling interval updated to {}ms", interval.as_millis());
        Ok(())
    }

    /// Remove a task. An in-flight execution completes but is never
    /// rescheduled.
    pub async fn unregister(&self, id: &str) -> Result<(), SchedulerError> {
        let mut tasks = self.shared.tasks.write().await;
        if tasks.remove(id).is_none() {
            return Err(SchedulerError::TaskNotFound(id.to_string()));
        }

        if let Some(metrics) = &self.shared.metrics {
            metrics.registered_tasks.set(tasks.len() as f64);
        }
        tracing::info!(task_id = %id, "Unregistered polling task");
        Ok(())
    }

    async fn task(&self, id: &str) -> Result<Arc<PollingTask>, SchedulerError> {
        self.shared
            .tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SchedulerError::TaskNotFound(id.to_string()))
    }

    /// Start the tick and recovery-probe loops. No-op if already started.
    pub async fn start(&self) {
        let mut loops = self.loops.lock().await;
        if loops.is_some() {
            tracing::debug!("Polling scheduler already running");
            return;
        }

        let (shutdown, rx) = watch::channel(false);
        let handles = vec![
            tokio::spawn(tick_loop(Arc::clone(&self.shared), rx.clone())),
            tokio::spawn(probe_loop(Arc::clone(&self.shared), rx)),
        ];
        *loops = Some(Loops { shutdown, handles });

        tracing::info!(
            "Polling scheduler started (tick: {}ms)",
            self.shared.config.tick_interval.as_millis()
        );
    }

    /// Stop scheduling. Executions already in flight run to completion.
    /// No-op if not started.
    pub async fn stop(&self) {
        let loops = self.loops.lock().await.take();
        let Some(loops) = loops else {
            return;
        };

        let _ = loops.shutdown.send(true);
        for handle in loops.handles {
            if let Err(err) = handle.await {
                tracing::error!("Scheduler loop ended abnormally: {}", err);
            }
        }

        tracing::info!("Polling scheduler stopped cleanly");
    }

    pub async fn is_started(&self) -> bool {
        self.loops.lock().await.is_some()
    }

    /// Scan once and fire every due, idle task. The tick loop calls this.
    pub async fn tick(&self) {
        tick(&self.shared).await;
    }

    /// Probe every down provider once. The probe loop calls this.
    pub async fn probe_down_providers(&self) {
        probe_down_providers(&self.shared).await;
    }

    /// Task statuses, sorted by id.
    pub async fn get_status(&self) -> Vec<TaskStatus> {
        let tasks = snapshot_tasks(&self.shared).await;
        let mut statuses = Vec::with_capacity(tasks.len());
        for task in tasks {
            statuses.push(task.status().await);
        }
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    /// Make a provider visible to [`get_provider_health`](Self::get_provider_health)
    /// before, or without, any task binding it. Providers bound at task
    /// registration are added automatically.
    pub async fn register_provider(&self, provider: Arc<Provider>) {
        self.shared
            .providers
            .write()
            .await
            .entry(provider.id().to_string())
            .or_insert(provider);
    }

    /// Health of every known provider, ordered by priority then id. A
    /// provider stays listed after the tasks binding it are unregistered.
    pub async fn get_provider_health(&self) -> Vec<ProviderHealth> {
        let mut providers: Vec<Arc<Provider>> =
            self.shared.providers.read().await.values().cloned().collect();
        sort_by_priority(&mut providers);

        let mut health = Vec::with_capacity(providers.len());
        for provider in providers {
            health.push(provider.health().await);
        }
        health
    }

    pub async fn polling_config(&self) -> PollingConfig {
        self.shared.polling.read().await.clone()
    }

    /// Merge into the interval table. Affects tasks registered afterwards.
    pub async fn merge_polling_config(&self, patch: PollingConfigPatch) {
        self.shared.polling.write().await.merge(patch);
    }

    /// Replace the interval table. Affects tasks registered afterwards.
    pub async fn replace_polling_config(&self, config: PollingConfig) {
        *self.shared.polling.write().await = config;
    }
}

async fn tick_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = time::interval(shared.config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => tick(&shared).await,
            _ = shutdown.changed() => break,
        }
    }
}

async fn probe_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = time::interval(shared.config.probe_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // Skip the immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => probe_down_providers(&shared).await,
            _ = shutdown.changed() => break,
        }
    }
}

async fn snapshot_tasks(shared: &Shared) -> Vec<Arc<PollingTask>> {
    shared.tasks.read().await.values().cloned().collect()
}

/// Distinct providers bound to a registered task, ordered by priority
/// then id. These are the ones the recovery probe watches.
async fn bound_providers(shared: &Shared) -> Vec<Arc<Provider>> {
    let mut seen = HashSet::new();
    let mut providers: Vec<Arc<Provider>> = snapshot_tasks(shared)
        .await
        .iter()
        .flat_map(|task| task.providers.iter().cloned())
        .filter(|provider| seen.insert(provider.id().to_string()))
        .collect();

    sort_by_priority(&mut providers);
    providers
}

fn sort_by_priority(providers: &mut [Arc<Provider>]) {
    providers.sort_by(|a, b| {
        a.config()
            .priority
            .cmp(&b.config().priority)
            .then_with(|| a.id().cmp(b.id()))
    });
}

async fn tick(shared: &Arc<Shared>) {
    let now = Instant::now();

    for task in snapshot_tasks(shared).await {
        // Not due, or still running from an earlier fire.
        if !task.try_fire(now).await {
            continue;
        }

        tokio::spawn(execute(Arc::clone(shared), task));
    }
}

async fn probe_down_providers(shared: &Shared) {
    let mut probes = Vec::new();
    for provider in bound_providers(shared).await {
        if !provider.config().enabled || !provider.health().await.status.is_down() {
            continue;
        }
        probes.push(tokio::spawn(async move {
            let recovered = provider.health_check().await;
            if recovered {
                tracing::info!(provider = %provider.id(), "Provider recovered");
            }
        }));
    }

    for probe in probes {
        if let Err(err) = probe.await {
            tracing::error!("Provider probe panicked: {}", err);
        }
    }
}

/// One execution of a task, from Running back to Idle.
async fn execute(shared: Arc<Shared>, task: Arc<PollingTask>) {
    task.mark_started().await;
    if let Some(metrics) = &shared.metrics {
        metrics.task_runs_total.with_label_values(&[&task.id]).inc();
    }

    let pipeline = tokio::spawn(run_pipeline(Arc::clone(&shared), Arc::clone(&task)));

    let report = match pipeline.await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(task_id = %task.id, "Task execution panicked: {}", err);
            if let Some(metrics) = &shared.metrics {
                metrics.task_panics_total.with_label_values(&[&task.id]).inc();
            }
            RunReport::default()
        }
    };

    task.finish(report).await;
}

async fn run_pipeline(shared: Arc<Shared>, task: Arc<PollingTask>) -> RunReport {
    match &task.kind {
        TaskKind::LiveScores(callback) => {
            let fan_out = fan_out(&shared, &task, |provider, params| async move {
                provider.fetch_live_scores(&params).await
            })
            .await;
            let merged = merge_live_scores(&fan_out.readings);
            deliver(&shared, &task, callback.as_ref(), merged).await;
            report(&task, fan_out)
        }
        TaskKind::Markets(callback) => {
            let fan_out = fan_out(&shared, &task, |provider, params| async move {
                provider.fetch_markets(&params).await
            })
            .await;
            let merged = merge_markets(&fan_out.readings);
            deliver(&shared, &task, callback.as_ref(), merged).await;
            report(&task, fan_out)
        }
    }
}

fn report<T>(task: &PollingTask, fan_out: FanOutResult<T>) -> RunReport {
    tracing::debug!(
        task_id = %task.id,
        readings = fan_out.readings.len(),
        succeeded = fan_out.succeeded.len(),
        failed = fan_out.failures.len(),
        skipped = fan_out.skipped.len(),
        "Task run complete"
    );

    RunReport {
        failures: fan_out.failures,
        skipped: fan_out.skipped,
    }
}

/// Fetch from every available provider concurrently. One provider's
/// failure or panic never affects the others.
async fn fan_out<T, F, Fut>(shared: &Shared, task: &PollingTask, fetch: F) -> FanOutResult<T>
where
    T: Send + 'static,
    F: Fn(Arc<Provider>, FetchParams) -> Fut,
    Fut: Future<Output = ProviderResult<Vec<T>>> + Send + 'static,
{
    let mut result = FanOutResult::new();
    let mut pending = Vec::with_capacity(task.providers.len());

    for provider in &task.providers {
        if !provider.is_available().await {
            result.skipped.push(provider.id().to_string());
            continue;
        }

        let request = fetch(Arc::clone(provider), task.params.clone());
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = request.await;
            (outcome, started.elapsed())
        });
        pending.push((provider.id().to_string(), handle));
    }

    for (provider_id, handle) in pending {
        let outcome = match handle.await {
            Ok((outcome, elapsed)) => {
                if let Some(metrics) = &shared.metrics {
                    metrics
                        .provider_fetch_duration
                        .with_label_values(&[&provider_id])
                        .observe(elapsed.as_secs_f64());
                }
                outcome.map_err(|err| err.to_string())
            }
            Err(err) => Err(format!("fetch panicked: {}", err)),
        };

        let label = if outcome.is_ok() { "ok" } else { "error" };
        if let Some(metrics) = &shared.metrics {
            metrics
                .provider_fetches_total
                .with_label_values(&[&provider_id, label])
                .inc();
        }

        match outcome {
            Ok(readings) => {
                result.readings.extend(readings);
                result.succeeded.push(provider_id);
            }
            Err(reason) => {
                result.failures.push(ProviderFailure { provider_id, reason });
            }
        }
    }

    result
}

async fn deliver<T: Send + 'static>(
    shared: &Shared,
    task: &PollingTask,
    callback: &dyn DeliveryCallback<T>,
    batch: Vec<T>,
) {
    if let Err(err) = callback.deliver(&task.id, batch).await {
        tracing::error!(task_id = %task.id, "Delivery callback failed: {}", err);
        if let Some(metrics) = &shared.metrics {
            metrics
                .delivery_failures_total
                .with_label_values(&[&task.id])
                .inc();
        }
    }
}
