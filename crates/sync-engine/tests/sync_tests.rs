// crates/sync-engine/tests/sync_tests.rs
//! Integration tests for the sync engine against the in-memory store

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timershare_core::{ClockSkewEstimator, SyncDocument, TimerRecord};
use timershare_network::MemoryStore;
use timershare_sync_engine::{
    Collaborators, RevalidateOutcome, StaticName, SyncConfig, SyncCoordinator, UpsertOutcome,
};

fn empty_store(latency: Duration) -> Arc<MemoryStore> {
    let now = ClockSkewEstimator::system().now();
    Arc::new(MemoryStore::new(&SyncDocument::new(now)).with_latency(latency))
}

fn device(store: &Arc<MemoryStore>, name: &str, config: SyncConfig) -> SyncCoordinator {
    let clock = Arc::new(ClockSkewEstimator::system());
    let collaborators = Collaborators::default().with_names(StaticName(name.to_string()));
    SyncCoordinator::new(config, store.clone(), clock, collaborators)
}

#[tokio::test(start_paused = true)]
async fn test_rapid_upserts_coalesce_into_one_push() {
    let store = empty_store(Duration::ZERO);
    let alpha = device(&store, "alpha", SyncConfig::default());

    for secs in [90, 120, 150] {
        let outcome = alpha
            .start_timer("nether", Duration::from_secs(secs), "", "")
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Scheduled);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    assert_eq!(store.stats().posts, 0);

    tokio::time::sleep(Duration::from_secs(13)).await;
    assert_eq!(store.stats().posts, 1);
    assert_eq!(alpha.pending_pushes(), 0);

    let remote = store.document().unwrap();
    let record = remote.get("nether").unwrap();
    assert_eq!(record.initial_duration, Duration::from_secs(150));
    assert_eq!(record.created_by, "alpha");
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_each_key_gets_its_own_push() {
    let store = empty_store(Duration::ZERO);
    let alpha = device(&store, "alpha", SyncConfig::default());

    alpha
        .start_timer("nether", Duration::from_secs(90), "", "")
        .await
        .unwrap();
    alpha
        .start_timer("end", Duration::from_secs(300), "", "")
        .await
        .unwrap();
    assert_eq!(alpha.pending_pushes(), 2);

    tokio::time::sleep(Duration::from_secs(13)).await;
    assert_eq!(store.stats().posts, 2);
    assert_eq!(store.document().unwrap().len(), 2);
    assert_eq!(alpha.metrics().pushes, 2);
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_two_devices_converge() {
    let store = empty_store(Duration::ZERO);
    let alpha = device(&store, "alpha", SyncConfig::default());
    let beta = device(&store, "beta", SyncConfig::default());

    alpha
        .start_timer("nether", Duration::from_secs(120), "dusk", "Dusk")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(13)).await;

    beta.start_timer("end", Duration::from_secs(300), "", "")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(13)).await;

    assert_eq!(store.document().unwrap().len(), 2);
    assert_eq!(beta.get("nether").unwrap().created_by, "alpha");

    assert_eq!(alpha.sync_now().await.unwrap(), RevalidateOutcome::Merged);
    let keys: Vec<String> = alpha.get_all().into_iter().map(|r| r.key).collect();
    assert_eq!(keys, vec!["end".to_string(), "nether".to_string()]);

    alpha.shutdown();
    beta.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_writers_resolve_conflict() {
    let store = empty_store(Duration::from_millis(50));
    let alpha = device(&store, "alpha", SyncConfig::default());
    let beta = device(&store, "beta", SyncConfig::default());

    alpha
        .start_timer("nether", Duration::from_secs(120), "", "")
        .await
        .unwrap();
    beta.start_timer("end", Duration::from_secs(300), "", "")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(14)).await;

    let stats = store.stats();
    assert_eq!(stats.posts, 3);
    assert_eq!(stats.version, 3);
    assert_eq!(alpha.metrics().conflicts + beta.metrics().conflicts, 1);
    assert_eq!(alpha.metrics().pushes + beta.metrics().pushes, 2);

    let remote = store.document().unwrap();
    assert!(remote.get("nether").is_some());
    assert!(remote.get("end").is_some());

    alpha.shutdown();
    beta.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_pushed_timer_visible_to_later_pulls_only() {
    let store = empty_store(Duration::ZERO);
    let alpha = device(&store, "alpha", SyncConfig::default());
    let beta = device(&store, "beta", SyncConfig::default());
    let t = alpha.now();

    alpha
        .start_timer("nether", Duration::from_secs(90), "", "")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    beta.sync_now().await.unwrap();
    assert!(beta.get("nether").is_none());

    tokio::time::sleep(Duration::from_secs(15)).await;
    beta.sync_now().await.unwrap();
    let seen = beta.get("nether").unwrap();
    let drift = (seen.expires_at - (t + chrono::Duration::seconds(90))).num_seconds();
    assert!(drift.abs() <= 1, "expiry off by {}s", drift);

    alpha.shutdown();
    beta.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_writes_to_one_key_keep_later_expiry() {
    let store = empty_store(Duration::from_millis(50));
    let alpha = device(&store, "alpha", SyncConfig::default());
    let beta = device(&store, "beta", SyncConfig::default());

    alpha
        .start_timer("nether", Duration::from_secs(120), "", "")
        .await
        .unwrap();
    beta.start_timer("nether", Duration::from_secs(300), "", "")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(14)).await;

    assert_eq!(alpha.metrics().conflicts + beta.metrics().conflicts, 1);
    let remote = store.document().unwrap();
    let record = remote.get("nether").unwrap();
    assert_eq!(record.created_by, "beta");
    assert_eq!(record.initial_duration, Duration::from_secs(300));

    alpha.sync_now().await.unwrap();
    assert_eq!(alpha.get("nether").unwrap().created_by, "beta");
    alpha.shutdown();
    beta.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_prune_loop_drops_expired_timers() {
    let store = empty_store(Duration::ZERO);
    let config = SyncConfig::default()
        .with_intervals(Duration::from_secs(3600), Duration::from_secs(30));
    let alpha = device(&store, "alpha", config);
    alpha.start();

    alpha
        .start_timer("nether", Duration::from_secs(20), "", "")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(13)).await;
    assert!(alpha.get("nether").is_some());

    tokio::time::sleep(Duration::from_secs(18)).await;
    assert!(alpha.document().get("nether").is_none());
    assert!(alpha.get_all().is_empty());
    assert_eq!(alpha.metrics().pruned, 1);
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_pull_loop_recovers_after_failure() {
    let store = empty_store(Duration::ZERO);
    store.fail_next_pulls(1);
    let alpha = device(&store, "alpha", SyncConfig::default());
    alpha.start();

    tokio::time::sleep(Duration::from_secs(16)).await;

    let metrics = alpha.metrics();
    assert_eq!(metrics.failures, 1);
    assert_eq!(metrics.pulls_updated, 1);
    assert!(metrics.last_pull.is_some());
    assert_eq!(store.stats().gets, 2);

    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["pulls_updated"], 1);
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_sync_now_merges_remote_timers() {
    let now = ClockSkewEstimator::system().now();
    let seeded = SyncDocument::new(now).with_timer(
        TimerRecord::new("overworld", Duration::from_secs(600), "beta", now),
        now,
    );
    let store = Arc::new(MemoryStore::new(&seeded));
    let alpha = device(&store, "alpha", SyncConfig::default());

    assert!(alpha.get("overworld").is_none());
    assert_eq!(alpha.sync_now().await.unwrap(), RevalidateOutcome::Merged);
    assert_eq!(alpha.get("overworld").unwrap().created_by, "beta");
    assert_eq!(alpha.sync_now().await.unwrap(), RevalidateOutcome::Unchanged);
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_equivalent_record_is_already_synced() {
    let store = empty_store(Duration::ZERO);
    let alpha = device(&store, "alpha", SyncConfig::default());
    let now = ClockSkewEstimator::system().now();
    let record = TimerRecord::new("nether", Duration::from_secs(600), "alpha", now);

    let first = alpha.upsert("nether", record.clone()).await.unwrap();
    assert_eq!(first, UpsertOutcome::Scheduled);
    assert_eq!(
        alpha.upsert("nether", record.clone()).await.unwrap(),
        UpsertOutcome::Duplicate
    );

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(store.stats().posts, 1);

    let outcome = alpha.upsert("nether", record).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::AlreadySynced);
    assert_eq!(alpha.pending_pushes(), 0);
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_gate_closing_skips_pending_push() {
    let store = empty_store(Duration::ZERO);
    let open = Arc::new(AtomicBool::new(true));
    let flag = open.clone();
    let clock = Arc::new(ClockSkewEstimator::system());
    let collaborators = Collaborators::default().with_gate(move || flag.load(Ordering::SeqCst));
    let alpha = SyncCoordinator::new(SyncConfig::default(), store.clone(), clock, collaborators);

    let outcome = alpha
        .start_timer("nether", Duration::from_secs(90), "", "")
        .await
        .unwrap();
    assert!(outcome.is_scheduled());

    open.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(13)).await;

    assert_eq!(store.stats().gets, 0);
    assert_eq!(store.stats().posts, 0);
    assert!(alpha.get("nether").is_some());
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_push() {
    let store = empty_store(Duration::ZERO);
    let alpha = device(&store, "alpha", SyncConfig::default());
    alpha.start();

    alpha
        .start_timer("nether", Duration::from_secs(90), "", "")
        .await
        .unwrap();
    alpha.shutdown();
    assert!(!alpha.is_enabled());
    assert_eq!(alpha.pending_pushes(), 0);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(store.stats().posts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_debug_metrics_after_push() {
    let store = empty_store(Duration::ZERO);
    let alpha = device(&store, "alpha", SyncConfig::default());

    alpha
        .start_timer("nether", Duration::from_secs(90), "", "")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(13)).await;

    let line = alpha.debug_metrics();
    assert!(line.starts_with("sync=on etag=\"v2\" timers=1 pending=0"), "{}", line);
    assert!(line.contains("push=1"));
    assert!(line.contains("MEM[v=2,get=1,post=1]"));
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_failed_push_retried_on_next_pull_cycle() {
    let store = empty_store(Duration::ZERO);
    store.fail_next_pushes(1);
    let alpha = device(&store, "alpha", SyncConfig::default());
    alpha.start();

    alpha
        .start_timer("nether", Duration::from_secs(600), "", "")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(13)).await;
    assert_eq!(store.stats().posts, 1);
    assert!(store.document().unwrap().get("nether").is_none());
    assert!(alpha.subscribe().borrow().unpushed);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(store.stats().posts, 2);
    assert!(store.document().unwrap().get("nether").is_some());
    assert!(!alpha.subscribe().borrow().unpushed);

    // nothing left to push, later cycles only pull
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.stats().posts, 2);
    alpha.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_conflicts_retried_on_next_pull_cycle() {
    let store = empty_store(Duration::ZERO);
    let alpha = device(&store, "alpha", SyncConfig::default());
    alpha.start();

    alpha
        .start_timer("nether", Duration::from_secs(600), "", "")
        .await
        .unwrap();
    store.force_conflicts(2);

    tokio::time::sleep(Duration::from_secs(13)).await;
    assert_eq!(store.stats().posts, 2);
    assert!(store.document().unwrap().get("nether").is_none());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.stats().posts, 3);
    assert!(store.document().unwrap().get("nether").is_some());
    assert_eq!(alpha.metrics().pushes, 1);
    alpha.shutdown();
}
