//! End-to-end scheduler behaviour with the tick loop running.
//!
//! Every test runs on a paused Tokio clock, so provider delays, task
//! intervals and the tick cadence are all virtual and deterministic.
//! Providers are `MockFeedSource`s; delivery goes to a `ChannelSink` or an
//! ad-hoc closure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use sports_feed_poller::aggregation::AggregatedScore;
use sports_feed_poller::delivery::{from_fn, ChannelSink, DeliveryError};
use sports_feed_poller::polling::PollingConfig;
use sports_feed_poller::providers::{
    FetchParams, HealthStatus, MockFeedSource, Provider, ProviderConfig, ProviderError,
};
use sports_feed_poller::scheduler::{PollingScheduler, SchedulerConfig};

// ---- Helpers ----------------------------------------------------------------

fn make_provider(id: &str, source: MockFeedSource) -> (Arc<Provider>, Arc<MockFeedSource>) {
    let source = Arc::new(source);
    let provider = Arc::new(Provider::new(
        ProviderConfig::new(id, "http://localhost").with_timeout(Duration::from_secs(5)),
        source.clone(),
    ));
    (provider, source)
}

fn make_scheduler(default_interval_ms: u64) -> PollingScheduler {
    PollingScheduler::new(
        PollingConfig::new(default_interval_ms),
        SchedulerConfig {
            tick_interval: Duration::from_millis(100),
            probe_interval: Duration::from_secs(30),
        },
    )
}

fn lakers_celtics() -> Vec<sports_feed_poller::aggregation::LiveScore> {
    vec![MockFeedSource::sample_score("Lakers", "Celtics", 101, 99)]
}

// ---- Mutual exclusion -------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_task_never_overlaps_itself() {
    let scheduler = make_scheduler(1_000);
    let (provider, source) = make_provider(
        "slow",
        MockFeedSource::new()
            .with_scores(lakers_celtics())
            .with_delay(Duration::from_millis(1_500)),
    );
    let (sink, _rx) = ChannelSink::<AggregatedScore>::channel(64);

    scheduler
        .register_live_score_task("nba", vec![provider], FetchParams::default(), Arc::new(sink))
        .await
        .unwrap();
    scheduler.start().await;
    sleep(Duration::from_secs(10)).await;
    scheduler.stop().await;

    assert!(source.call_count() >= 3, "calls: {}", source.call_count());
    assert_eq!(source.max_concurrent_calls(), 1);
}

// ---- Interval changes -------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn interval_update_applies_after_in_flight_run() {
    let scheduler = make_scheduler(10_000);
    let (provider, source) = make_provider(
        "p",
        MockFeedSource::new().with_delay(Duration::from_secs(2)),
    );
    let (sink, _rx) = ChannelSink::<AggregatedScore>::channel(64);

    scheduler
        .register_live_score_task("t", vec![provider], FetchParams::default(), Arc::new(sink))
        .await
        .unwrap();
    scheduler.start().await;

    // t = 1s: first run is still fetching.
    sleep(Duration::from_secs(1)).await;
    assert!(scheduler.get_status().await[0].running);
    scheduler.update_interval("t", Duration::from_secs(3)).await.unwrap();

    // The in-flight run finishes at t = 2s and reschedules 3s out.
    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(source.call_count(), 1);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(source.call_count(), 2);
    assert_eq!(scheduler.get_status().await[0].interval_ms, 3_000);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn interval_update_reschedules_from_update_time() {
    let scheduler = make_scheduler(10_000);
    let (provider, source) = make_provider("p", MockFeedSource::new());
    let (sink, _rx) = ChannelSink::<AggregatedScore>::channel(64);

    scheduler
        .register_live_score_task("t", vec![provider], FetchParams::default(), Arc::new(sink))
        .await
        .unwrap();
    scheduler.start().await;

    sleep(Duration::from_secs(4)).await;
    assert_eq!(source.call_count(), 1);

    // Next natural fire would be t = 10s; updating at t = 4s moves it to 6s.
    scheduler.update_interval("t", Duration::from_secs(2)).await.unwrap();
    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(source.call_count(), 1);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(source.call_count(), 2);

    scheduler.stop().await;
}

// ---- Unregister -------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unregistered_in_flight_task_completes_once_and_stops() {
    let scheduler = make_scheduler(1_000);
    let (provider, source) = make_provider(
        "p",
        MockFeedSource::new()
            .with_scores(lakers_celtics())
            .with_delay(Duration::from_secs(2)),
    );
    let (sink, mut rx) = ChannelSink::<AggregatedScore>::channel(64);

    scheduler
        .register_live_score_task("t", vec![provider], FetchParams::default(), Arc::new(sink))
        .await
        .unwrap();
    scheduler.start().await;

    sleep(Duration::from_millis(500)).await;
    scheduler.unregister("t").await.unwrap();
    assert!(scheduler.get_status().await.is_empty());

    sleep(Duration::from_secs(5)).await;
    scheduler.stop().await;

    let (task_id, batch) = rx.try_recv().unwrap();
    assert_eq!(task_id, "t");
    assert_eq!(batch.len(), 1);
    assert!(rx.try_recv().is_err());
    assert_eq!(source.call_count(), 1);
}

// ---- Fault isolation --------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failing_callback_keeps_task_scheduled() {
    let scheduler = make_scheduler(1_000);
    let (provider, source) = make_provider("p", MockFeedSource::new().with_scores(lakers_celtics()));
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let callback = from_fn(move |_task: String, _batch: Vec<AggregatedScore>| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(DeliveryError::new("sink offline"))
        }
    });

    scheduler
        .register_live_score_task("t", vec![provider.clone()], FetchParams::default(), Arc::new(callback))
        .await
        .unwrap();
    scheduler.start().await;
    sleep(Duration::from_millis(3_500)).await;
    scheduler.stop().await;

    assert!(attempts.load(Ordering::SeqCst) >= 3);
    assert_eq!(source.call_count(), attempts.load(Ordering::SeqCst));
    // Delivery failures are not provider failures.
    assert_eq!(provider.health().await.status, HealthStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn panicking_provider_does_not_stop_the_task() {
    let scheduler = make_scheduler(1_000);
    let (good, good_source) = make_provider("good", MockFeedSource::new().with_scores(lakers_celtics()));
    let (bad, _) = make_provider("bad", MockFeedSource::new().panicking());
    let (sink, mut rx) = ChannelSink::<AggregatedScore>::channel(64);

    scheduler
        .register_live_score_task("t", vec![good, bad], FetchParams::default(), Arc::new(sink))
        .await
        .unwrap();
    scheduler.start().await;
    sleep(Duration::from_millis(2_500)).await;
    scheduler.stop().await;

    assert!(good_source.call_count() >= 2);
    let mut batches = 0;
    while let Ok((_, batch)) = rx.try_recv() {
        assert_eq!(batch[0].sources, vec!["good".to_string()]);
        batches += 1;
    }
    assert!(batches >= 2);
}

#[tokio::test(start_paused = true)]
async fn down_provider_is_left_out_until_probe_recovers_it() {
    let scheduler = PollingScheduler::new(
        PollingConfig::new(1_000),
        SchedulerConfig {
            tick_interval: Duration::from_millis(100),
            probe_interval: Duration::from_secs(5),
        },
    );
    let (primary, _) = make_provider("primary", MockFeedSource::new().with_scores(lakers_celtics()));
    let (backup, backup_source) = make_provider(
        "backup",
        MockFeedSource::new()
            .with_scores(lakers_celtics())
            .with_error(ProviderError::ServiceUnavailable),
    );
    let (sink, mut rx) = ChannelSink::<AggregatedScore>::channel(64);

    scheduler
        .register_live_score_task(
            "t",
            vec![primary, backup.clone()],
            FetchParams::default(),
            Arc::new(sink),
        )
        .await
        .unwrap();
    scheduler.start().await;

    // Four failed runs (t = 0, 1, 2, 3) take the backup down.
    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(backup.health().await.status, HealthStatus::Down);
    let calls_when_down = backup_source.call_count();
    assert_eq!(calls_when_down, 4);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(backup_source.call_count(), calls_when_down);

    // The probe at t = 5s sees the upstream back and restores it.
    backup_source.clear_error();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(backup.health().await.status, HealthStatus::Healthy);
    assert!(backup_source.call_count() > calls_when_down);

    scheduler.stop().await;

    let mut last = None;
    while let Ok((_, batch)) = rx.try_recv() {
        last = Some(batch);
    }
    let last = last.unwrap();
    assert_eq!(last[0].sources, vec!["primary".to_string(), "backup".to_string()]);
}

// ---- Lifecycle --------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stop_halts_further_runs() {
    let scheduler = make_scheduler(1_000);
    let (provider, source) = make_provider("p", MockFeedSource::new());
    let (sink, _rx) = ChannelSink::<AggregatedScore>::channel(64);

    scheduler
        .register_live_score_task("t", vec![provider], FetchParams::default(), Arc::new(sink))
        .await
        .unwrap();
    scheduler.start().await;
    sleep(Duration::from_millis(2_500)).await;
    scheduler.stop().await;

    let calls = source.call_count();
    assert_eq!(calls, 3);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(source.call_count(), calls);

    let statuses = scheduler.get_status().await;
    let status = &statuses[0];
    assert!(!status.running);
    assert!(status.last_run.is_some());
}
