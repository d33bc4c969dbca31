// crates/sync-engine/src/coordinator.rs
//! Public façade: local upserts, debounced pushes and background loops

use crate::actor::{Snapshot, SyncActor};
use crate::collaborators::{AllowAll, DisplayNameProvider, StaticName, SyncGate};
use crate::dedup::DedupWindow;
use crate::error::{SyncError, SyncResult};
use crate::types::{OpId, RevalidateOutcome, SyncMetrics, UpsertOutcome, WriteReport};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use timershare_core::{ClockSkewEstimator, SyncDocument, TimerRecord};
use timershare_network::RemoteStore;
use timershare_resilience::RetryPolicy;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Timing and retry settings of the coordinator
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether sync starts enabled
    pub enabled: bool,
    /// Quiet period before a key's push fires
    pub debounce: Duration,
    /// Period of the background pull
    pub pull_interval: Duration,
    /// Period of the background prune
    pub prune_interval: Duration,
    /// Lifetime of dedup entries
    pub dedup_window: Duration,
    /// Expiry rounding used by dedup
    pub dedup_granularity: Duration,
    /// Expiry gap under which an upsert matches the committed record
    pub equivalence_tolerance: Duration,
    /// Revalidate-and-retry rounds after a conflict
    pub conflict_retries: usize,
    /// Delay before the first conflict retry
    pub conflict_backoff: Duration,
}

impl SyncConfig {
    /// Sets the debounce delay
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the background pull and prune periods
    pub fn with_intervals(mut self, pull: Duration, prune: Duration) -> Self {
        self.pull_interval = pull;
        self.prune_interval = prune;
        self
    }

    /// Sets the conflict retry bound
    pub fn with_conflict_retries(mut self, retries: usize) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Retry policy for conflicts
    pub fn conflict_policy(&self) -> RetryPolicy {
        RetryPolicy::with_retries(self.conflict_retries).with_initial_delay(self.conflict_backoff)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_secs(12),
            pull_interval: Duration::from_secs(15),
            prune_interval: Duration::from_secs(30),
            dedup_window: Duration::from_secs(30),
            dedup_granularity: Duration::from_secs(10),
            equivalence_tolerance: Duration::from_secs(10),
            conflict_retries: 1,
            conflict_backoff: Duration::ZERO,
        }
    }
}

/// Host collaborators handed to the coordinator
#[derive(Clone)]
pub struct Collaborators {
    pub gate: Arc<dyn SyncGate>,
    pub names: Arc<dyn DisplayNameProvider>,
}

impl Collaborators {
    /// Sets the access gate
    pub fn with_gate(mut self, gate: impl SyncGate + 'static) -> Self {
        self.gate = Arc::new(gate);
        self
    }

    /// Sets the display-name provider
    pub fn with_names(mut self, names: impl DisplayNameProvider + 'static) -> Self {
        self.names = Arc::new(names);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            gate: Arc::new(AllowAll),
            names: Arc::new(StaticName("anonymous".to_string())),
        }
    }
}

struct Inner {
    config: SyncConfig,
    actor: SyncActor,
    clock: Arc<ClockSkewEstimator>,
    store: Arc<dyn RemoteStore>,
    collaborators: Collaborators,
    enabled: AtomicBool,
    dedup: Mutex<DedupWindow>,
    pending: Mutex<HashMap<String, (u64, JoinHandle<()>)>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    generation: AtomicU64,
    duplicates: AtomicU64,
    retry_push: AtomicBool,
}

/// Entry point for the host: shared timers, kept in sync with the remote
///
/// Must be created inside a Tokio runtime. Cloning yields another handle to
/// the same coordinator.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    /// Creates a coordinator and its actor; call [`start`](Self::start) to run the loops
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn RemoteStore>,
        clock: Arc<ClockSkewEstimator>,
        collaborators: Collaborators,
    ) -> Self {
        let actor = SyncActor::spawn(store.clone(), clock.clone(), config.conflict_policy());
        let dedup = DedupWindow::new(config.dedup_window, config.dedup_granularity);

        Self {
            inner: Arc::new(Inner {
                enabled: AtomicBool::new(config.enabled),
                config,
                actor,
                clock,
                store,
                collaborators,
                dedup: Mutex::new(dedup),
                pending: Mutex::new(HashMap::new()),
                background: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
                duplicates: AtomicU64::new(0),
                retry_push: AtomicBool::new(false),
            }),
        }
    }

    /// Starts the periodic pull and prune loops
    ///
    /// The first pull runs immediately. After a push failed or was skipped,
    /// each pull cycle runs a full write instead until the local changes are
    /// accepted by the remote.
    pub fn start(&self) {
        let Ok(mut background) = self.inner.background.lock() else {
            return;
        };
        if !background.is_empty() {
            return;
        }

        let puller = self.clone();
        let pull_interval = self.inner.config.pull_interval;
        background.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pull_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if puller.may_sync() {
                    puller.sync_cycle().await;
                }
            }
        }));

        let pruner = self.clone();
        let prune_interval = self.inner.config.prune_interval;
        background.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + prune_interval,
                prune_interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if pruner.inner.actor.prune_expired().await.is_err() {
                    break;
                }
            }
        }));

        log::info!(
            "Sync started: pull every {:?}, prune every {:?}, debounce {:?}",
            pull_interval,
            prune_interval,
            self.inner.config.debounce
        );
    }

    /// Applies `record` under `key` and schedules a debounced push
    pub async fn upsert(&self, key: &str, mut record: TimerRecord) -> SyncResult<UpsertOutcome> {
        if !self.is_enabled() {
            return Ok(UpsertOutcome::Disabled);
        }
        if !self.inner.collaborators.gate.is_allowed() {
            return Ok(UpsertOutcome::NotAuthorized);
        }
        record.key = key.to_string();

        let fresh = self
            .inner
            .dedup
            .lock()
            .map(|mut d| d.check_and_insert(key, record.expires_at))
            .unwrap_or(true);
        if !fresh {
            log::debug!("Duplicate event for '{}' dropped", key);
            self.inner.duplicates.fetch_add(1, Ordering::Relaxed);
            return Ok(UpsertOutcome::Duplicate);
        }

        let snapshot = self.inner.actor.snapshot();
        if let Some(committed) = snapshot.document.get(key) {
            if committed.is_equivalent_to(&record, self.inner.config.equivalence_tolerance) {
                log::debug!("'{}' already synced, no push needed", key);
                return Ok(UpsertOutcome::AlreadySynced);
            }
        }

        let expires_at = record.expires_at;
        if let Err(e) = self.inner.actor.apply_local_upsert(record).await {
            if let Ok(mut dedup) = self.inner.dedup.lock() {
                dedup.release(key, expires_at);
            }
            return match e {
                SyncError::InvalidRecord(e) => {
                    log::warn!("Rejected record for '{}': {}", key, e);
                    Ok(UpsertOutcome::Rejected(e.to_string()))
                }
                e => Err(e),
            };
        }

        self.schedule_push(key);
        Ok(UpsertOutcome::Scheduled)
    }

    /// Builds a record from the corrected clock and upserts it
    pub async fn start_timer(
        &self,
        key: &str,
        duration: Duration,
        phase: &str,
        phase_display: &str,
    ) -> SyncResult<UpsertOutcome> {
        let created_by = self.inner.collaborators.names.display_name();
        let record = TimerRecord::new(key, duration, created_by, self.inner.clock.now())
            .with_phase(phase, phase_display);
        self.upsert(key, record).await
    }

    /// Forces an immediate revalidate-and-merge
    pub async fn sync_now(&self) -> SyncResult<RevalidateOutcome> {
        if !self.is_enabled() {
            return Err(SyncError::Disabled);
        }
        if !self.inner.collaborators.gate.is_allowed() {
            return Err(SyncError::NotAuthorized);
        }
        self.inner.actor.revalidate_and_merge(OpId::new()).await
    }

    /// Pushes now instead of waiting out pending debounce delays
    ///
    /// Returns `None` when nothing was pending.
    pub async fn flush_now(&self) -> SyncResult<Option<WriteReport>> {
        if !self.may_sync() {
            return Err(if self.is_enabled() {
                SyncError::NotAuthorized
            } else {
                SyncError::Disabled
            });
        }
        let cancelled = self.cancel_pending();
        if cancelled == 0 {
            return Ok(None);
        }

        let op_id = OpId::new();
        log::debug!("[{}] Flushing {} pending keys", op_id, cancelled);
        let result = self.inner.actor.write(op_id).await;
        self.note_write(&result);
        result.map(Some)
    }

    /// Receiver notified whenever the committed state changes
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.actor.subscribe()
    }

    /// Unexpired records of the last committed document
    pub fn get_all(&self) -> Vec<TimerRecord> {
        let now = self.inner.clock.now();
        self.inner
            .actor
            .snapshot()
            .document
            .active_timers(now)
            .cloned()
            .collect()
    }

    /// Unexpired record for `key`, if any
    pub fn get(&self, key: &str) -> Option<TimerRecord> {
        let now = self.inner.clock.now();
        self.inner
            .actor
            .snapshot()
            .document
            .get(key)
            .filter(|r| !r.is_expired(now))
            .cloned()
    }

    /// Corrected current instant
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Last committed document, expired records included
    pub fn document(&self) -> Arc<SyncDocument> {
        self.inner.actor.snapshot().document
    }

    /// Switches sync on or off; switching off cancels pending pushes
    pub fn enable(&self, enabled: bool) {
        let previous = self.inner.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            log::info!("Sync {}", if enabled { "enabled" } else { "disabled" });
        }
        if !enabled {
            self.cancel_pending();
        }
    }

    /// Returns true if sync is switched on
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Number of keys with a push waiting for its debounce delay
    pub fn pending_pushes(&self) -> usize {
        self.inner.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Activity counters
    pub fn metrics(&self) -> SyncMetrics {
        let mut metrics = self.inner.actor.metrics();
        metrics.duplicates = self.inner.duplicates.load(Ordering::Relaxed);
        metrics
    }

    /// Compact one-line state for debug overlays and logs
    pub fn debug_metrics(&self) -> String {
        let snapshot = self.inner.actor.snapshot();
        format!(
            "sync={} etag={} timers={} pending={} {} {} {}",
            if self.is_enabled() { "on" } else { "off" },
            snapshot.etag.as_ref().map(|e| e.as_str()).unwrap_or("-"),
            snapshot.document.len(),
            self.pending_pushes(),
            self.metrics().compact(),
            self.inner.clock.compact_debug(),
            self.inner.store.debug_metrics()
        )
    }

    /// Cancels pending pushes and background loops, then stops the actor
    pub fn shutdown(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
        self.cancel_pending();
        if let Ok(mut background) = self.inner.background.lock() {
            for task in background.drain(..) {
                task.abort();
            }
        }
        self.inner.actor.shutdown();
        log::info!("Sync shut down");
    }

    fn may_sync(&self) -> bool {
        self.is_enabled() && self.inner.collaborators.gate.is_allowed()
    }

    async fn sync_cycle(&self) {
        let op_id = OpId::new();
        let unpushed = self.inner.actor.snapshot().unpushed;
        if !unpushed {
            self.inner.retry_push.store(false, Ordering::SeqCst);
        }
        let retry =
            unpushed && self.inner.retry_push.load(Ordering::SeqCst) && self.pending_pushes() == 0;
        if !retry {
            let _ = self.inner.actor.revalidate_and_merge(op_id).await;
            return;
        }

        log::info!("[{}] Retrying push of unsynced local changes", op_id);
        let result = self.inner.actor.write(op_id).await;
        self.note_write(&result);
        match result {
            Ok(report) if report.is_pushed() => {}
            Ok(report) => log::warn!(
                "[{}] Retry ended as {:?}, trying again next cycle",
                report.op_id,
                report.final_state()
            ),
            Err(e) => log::warn!("Retry push not attempted: {}", e),
        }
    }

    fn note_write(&self, result: &SyncResult<WriteReport>) {
        if let Ok(report) = result {
            self.inner
                .retry_push
                .store(!report.is_pushed(), Ordering::SeqCst);
        }
    }

    fn schedule_push(&self, key: &str) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let Ok(mut pending) = self.inner.pending.lock() else {
            return;
        };
        if let Some((_, previous)) = pending.remove(key) {
            previous.abort();
            log::debug!("Debounced push for '{}' rearmed", key);
        }

        let coordinator = self.clone();
        let key_owned = key.to_string();
        let delay = self.inner.config.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.flush(&key_owned, generation).await;
        });
        pending.insert(key.to_string(), (generation, handle));
    }

    async fn flush(&self, key: &str, generation: u64) {
        if let Ok(mut pending) = self.inner.pending.lock() {
            if pending.get(key).map(|(g, _)| *g) == Some(generation) {
                pending.remove(key);
            }
        }
        if !self.may_sync() {
            log::debug!("Push for '{}' skipped: sync not allowed", key);
            self.inner.retry_push.store(true, Ordering::SeqCst);
            return;
        }

        let op_id = OpId::new();
        log::debug!("[{}] Debounced push for '{}'", op_id, key);
        let result = self.inner.actor.write(op_id).await;
        self.note_write(&result);
        match result {
            Ok(report) if report.is_pushed() => {}
            Ok(report) => log::warn!(
                "[{}] Push for '{}' ended as {:?}",
                report.op_id,
                key,
                report.final_state()
            ),
            Err(e) => log::warn!("Push for '{}' not attempted: {}", key, e),
        }
    }

    fn cancel_pending(&self) -> usize {
        let Ok(mut pending) = self.inner.pending.lock() else {
            return 0;
        };
        let count = pending.len();
        for (_, (_, handle)) in pending.drain() {
            handle.abort();
        }
        if count > 0 {
            self.inner.retry_push.store(true, Ordering::SeqCst);
        }
        count
    }
}
