use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;

use sports_feed_poller::cli::Cli;
use sports_feed_poller::config::{Config, FeedConfig};
use sports_feed_poller::delivery::LoggingSink;
use sports_feed_poller::error::AppError;
use sports_feed_poller::logging::init_logging;
use sports_feed_poller::metrics::AppMetrics;
use sports_feed_poller::providers::{HttpFeedSource, Provider};
use sports_feed_poller::scheduler::{PollingScheduler, TaskType};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    if let Err(err) = run(Cli::parse()).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::load(&cli).map_err(AppError::Config)?;
    tracing::info!("Service starting with config: {:?}", config);

    let feed = FeedConfig::load(&config.feed_config_path)?;

    let providers: HashMap<String, Arc<Provider>> = feed
        .providers
        .iter()
        .map(|provider_config| {
            let source = Arc::new(HttpFeedSource::from_config(provider_config));
            let provider = Provider::new(provider_config.clone(), source);
            (provider_config.id.clone(), Arc::new(provider))
        })
        .collect();

    let metrics = Arc::new(
        AppMetrics::new().map_err(|e| AppError::Config(format!("metrics registry: {}", e)))?,
    );
    let scheduler = PollingScheduler::new(feed.polling.clone(), config.scheduler_config())
        .with_metrics(Arc::clone(&metrics));

    for provider in providers.values() {
        scheduler.register_provider(Arc::clone(provider)).await;
    }

    for task in &feed.tasks {
        // References were checked when the feed file was loaded.
        let bound: Vec<Arc<Provider>> = task
            .providers
            .iter()
            .filter_map(|id| providers.get(id).cloned())
            .collect();

        let registered = match task.kind {
            TaskType::LiveScores => {
                scheduler
                    .register_live_score_task(task.id.clone(), bound, task.params.clone(), Arc::new(LoggingSink))
                    .await
            }
            TaskType::Markets => {
                scheduler
                    .register_market_task(task.id.clone(), bound, task.params.clone(), Arc::new(LoggingSink))
                    .await
            }
        };
        registered.map_err(|e| AppError::Config(e.to_string()))?;
    }

    scheduler.start().await;
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutdown signal received");
    scheduler.stop().await;

    for status in scheduler.get_status().await {
        tracing::info!(
            task_id = %status.id,
            runs = status.run_count,
            failures = status.last_failures.len(),
            "Final task status"
        );
    }
    for health in scheduler.get_provider_health().await {
        tracing::info!(
            provider = %health.provider_id,
            status = ?health.status,
            successes = health.total_successes,
            failures = health.total_failures,
            "Final provider health"
        );
    }
    match metrics.render() {
        Ok(text) => tracing::info!("Final metrics:\n{}", text),
        Err(err) => tracing::warn!("Failed to render metrics: {}", err),
    }

    Ok(())
}
