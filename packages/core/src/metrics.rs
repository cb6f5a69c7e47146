//! Prometheus metrics registry for the feed poller.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and attach it
//! to the scheduler with `PollingScheduler::with_metrics`.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Task executions, labelled by task id.
    pub task_runs_total: IntCounterVec,
    /// Task executions that panicked and were caught at the task boundary.
    pub task_panics_total: IntCounterVec,
    /// Provider fetches, labelled by provider id and outcome (`ok` / `error`).
    pub provider_fetches_total: IntCounterVec,
    /// Provider fetch latency in seconds, labelled by provider id.
    pub provider_fetch_duration: HistogramVec,
    /// Failed delivery callbacks, labelled by task id.
    pub delivery_failures_total: CounterVec,
    /// Number of currently registered tasks.
    pub registered_tasks: Gauge,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let task_runs_total = IntCounterVec::new(
            Opts::new("sports_feed_task_runs_total", "Polling task executions"),
            &["task"],
        )?;

        let task_panics_total = IntCounterVec::new(
            Opts::new(
                "sports_feed_task_panics_total",
                "Polling task executions that panicked",
            ),
            &["task"],
        )?;

        let provider_fetches_total = IntCounterVec::new(
            Opts::new(
                "sports_feed_provider_fetches_total",
                "Provider fetches by provider and outcome",
            ),
            &["provider", "outcome"],
        )?;

        let provider_fetch_duration = HistogramVec::new(
            HistogramOpts::new(
                "sports_feed_provider_fetch_duration_seconds",
                "Provider fetch latency in seconds",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["provider"],
        )?;

        let delivery_failures_total = CounterVec::new(
            Opts::new(
                "sports_feed_delivery_failures_total",
                "Delivery callbacks that returned an error",
            ),
            &["task"],
        )?;

        let registered_tasks = Gauge::with_opts(Opts::new(
            "sports_feed_registered_tasks",
            "Currently registered polling tasks",
        ))?;

        registry.register(Box::new(task_runs_total.clone()))?;
        registry.register(Box::new(task_panics_total.clone()))?;
        registry.register(Box::new(provider_fetches_total.clone()))?;
        registry.register(Box::new(provider_fetch_duration.clone()))?;
        registry.register(Box::new(delivery_failures_total.clone()))?;
        registry.register(Box::new(registered_tasks.clone()))?;

        Ok(Self {
            task_runs_total,
            task_panics_total,
            provider_fetches_total,
            provider_fetch_duration,
            delivery_failures_total,
            registered_tasks,
            registry,
        })
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
