// crates/sync-engine/src/actor.rs
//! Single-writer actor owning the authoritative `(document, etag)` pair
//!
//! Commands are executed strictly in submission order. A command that needs
//! the network starts a separate task for the request and parks the queue
//! until the result comes back as a completion message; the loop itself keeps
//! accepting commands meanwhile. Readers get immutable snapshots through a
//! `watch` channel and never wait on the queue.
//!
//! Local changes that have not reached the remote are tracked in the
//! snapshot (`unpushed`) until a push of the document carrying them is
//! accepted.

use crate::error::{SyncError, SyncResult};
use crate::types::{OpId, RevalidateOutcome, SyncMetrics, WriteReport, WriteState};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use timershare_core::{
    merge_documents, ClockSkewEstimator, CoreError, ETag, SyncDocument, TimerRecord, Validator,
};
use timershare_network::{PullOutcome, PushOutcome, RemoteStore};
use timershare_resilience::RetryPolicy;
use tokio::sync::{mpsc, oneshot, watch};

/// Last committed state, as seen by readers
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub document: Arc<SyncDocument>,
    pub etag: Option<ETag>,
    /// Local upserts not yet accepted by the remote
    pub unpushed: bool,
}

enum Command {
    Revalidate {
        op_id: OpId,
        reply: oneshot::Sender<RevalidateOutcome>,
    },
    Upsert {
        record: TimerRecord,
        reply: oneshot::Sender<SyncResult<()>>,
    },
    Push {
        op_id: OpId,
        revalidate_first: bool,
        reply: oneshot::Sender<WriteReport>,
    },
    Prune {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

enum Completion {
    Pulled {
        seq: u64,
        predicate: Option<ETag>,
        outcome: PullOutcome,
    },
    Pushed {
        seq: u64,
        document: Arc<SyncDocument>,
        outcome: PushOutcome,
    },
}

enum InFlight {
    Revalidate {
        seq: u64,
        op_id: OpId,
        reply: oneshot::Sender<RevalidateOutcome>,
    },
    Write {
        seq: u64,
        report: WriteReport,
        reply: oneshot::Sender<WriteReport>,
    },
}

impl InFlight {
    fn seq(&self) -> u64 {
        match self {
            InFlight::Revalidate { seq, .. } | InFlight::Write { seq, .. } => *seq,
        }
    }
}

/// Handle to the sync actor
///
/// Cloning the handle is cheap; every clone talks to the same actor task.
#[derive(Debug, Clone)]
pub struct SyncActor {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    metrics: Arc<Mutex<SyncMetrics>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Revalidate { .. } => "Revalidate",
            Command::Upsert { .. } => "Upsert",
            Command::Push { .. } => "Push",
            Command::Prune { .. } => "Prune",
            Command::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl SyncActor {
    /// Spawns the actor on the current runtime, starting from an empty document
    pub fn spawn(
        store: Arc<dyn RemoteStore>,
        clock: Arc<ClockSkewEstimator>,
        conflict_policy: RetryPolicy,
    ) -> Self {
        let initial = SyncDocument::new(clock.now());
        Self::spawn_with(store, clock, conflict_policy, initial)
    }

    /// Spawns the actor starting from `initial`
    pub fn spawn_with(
        store: Arc<dyn RemoteStore>,
        clock: Arc<ClockSkewEstimator>,
        conflict_policy: RetryPolicy,
        initial: SyncDocument,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let document = Arc::new(initial);
        let (publisher, snapshots) = watch::channel(Snapshot {
            document: document.clone(),
            etag: None,
            unpushed: false,
        });
        let metrics = Arc::new(Mutex::new(SyncMetrics::default()));

        let actor = Actor {
            store,
            clock,
            policy: conflict_policy,
            document,
            etag: None,
            unpushed: false,
            publisher,
            metrics: metrics.clone(),
            queue: VecDeque::new(),
            in_flight: None,
            completions: completions_tx,
            next_seq: 0,
        };
        tokio::spawn(actor.run(commands_rx, completions_rx));

        Self {
            commands: commands_tx,
            snapshots,
            metrics,
        }
    }

    /// Pulls the remote document and merges it if it changed
    pub async fn revalidate_and_merge(&self, op_id: OpId) -> SyncResult<RevalidateOutcome> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Revalidate { op_id, reply })?;
        Ok(rx.await?)
    }

    /// Inserts `record` into a copy of the current document and installs it
    pub async fn apply_local_upsert(&self, record: TimerRecord) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Upsert { record, reply })?;
        rx.await?
    }

    /// Pushes the current document, revalidating first only when no ETag is known
    pub async fn attempt_push(&self, op_id: OpId) -> SyncResult<WriteReport> {
        self.push(op_id, false).await
    }

    /// Revalidates, merges, then pushes the current document
    pub async fn write(&self, op_id: OpId) -> SyncResult<WriteReport> {
        self.push(op_id, true).await
    }

    /// Drops expired records, returning how many were removed
    pub async fn prune_expired(&self) -> SyncResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Prune { reply })?;
        Ok(rx.await?)
    }

    /// Stops the actor; commands still queued are dropped
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Returns true while the actor task accepts commands
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Last committed state
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every committed change
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Activity counters
    pub fn metrics(&self) -> SyncMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }

    async fn push(&self, op_id: OpId, revalidate_first: bool) -> SyncResult<WriteReport> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Push {
            op_id,
            revalidate_first,
            reply,
        })?;
        Ok(rx.await?)
    }
}

struct Actor {
    store: Arc<dyn RemoteStore>,
    clock: Arc<ClockSkewEstimator>,
    policy: RetryPolicy,
    document: Arc<SyncDocument>,
    etag: Option<ETag>,
    unpushed: bool,
    publisher: watch::Sender<Snapshot>,
    metrics: Arc<Mutex<SyncMetrics>>,
    queue: VecDeque<Command>,
    in_flight: Option<InFlight>,
    completions: mpsc::UnboundedSender<Completion>,
    next_seq: u64,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        log::debug!("Sync actor started");
        loop {
            self.drain_queue();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.queue.push_back(command),
                },
                Some(done) = completions.recv() => self.on_completion(done),
            }
        }
        log::debug!(
            "Sync actor stopped ({} queued commands dropped)",
            self.queue.len()
        );
    }

    fn drain_queue(&mut self) {
        while self.in_flight.is_none() {
            let Some(command) = self.queue.pop_front() else {
                break;
            };
            self.start(command);
        }
        self.update_metrics(|m| m.in_progress = self.in_flight.is_some());
    }

    fn start(&mut self, command: Command) {
        match command {
            Command::Upsert { record, reply } => {
                let _ = reply.send(self.apply_local_upsert(record));
            }
            Command::Prune { reply } => {
                let _ = reply.send(self.prune_expired());
            }
            Command::Revalidate { op_id, reply } => {
                let seq = self.next_seq();
                log::debug!("[{}] Revalidating", op_id);
                self.spawn_pull(seq, Duration::ZERO);
                self.in_flight = Some(InFlight::Revalidate { seq, op_id, reply });
            }
            Command::Push {
                op_id,
                revalidate_first,
                reply,
            } => {
                let seq = self.next_seq();
                let mut report = WriteReport::new(op_id);
                if revalidate_first || self.etag.is_none() {
                    report.enter(WriteState::Revalidating);
                    self.spawn_pull(seq, Duration::ZERO);
                } else {
                    report.push_attempts += 1;
                    self.spawn_push(seq);
                }
                self.in_flight = Some(InFlight::Write { seq, report, reply });
            }
            Command::Shutdown => {}
        }
    }

    fn apply_local_upsert(&mut self, record: TimerRecord) -> SyncResult<()> {
        let now = self.clock.now();
        let record = match self.document.get(&record.key) {
            Some(existing) if !existing.is_expired(now) => record.inherit_phase_from(existing),
            _ => record,
        };
        record
            .validate()
            .map_err(|reasons| CoreError::invalid_record(&record.key, reasons))?;

        log::debug!(
            "Local upsert '{}' expiring at {}",
            record.key,
            record.expires_at
        );
        let next = self.document.with_timer(record, now);
        self.unpushed = true;
        self.install(next);
        Ok(())
    }

    fn prune_expired(&mut self) -> usize {
        let now = self.clock.now();
        let (next, removed) = self.document.pruned(now);
        if removed > 0 {
            log::debug!("Pruned {} expired timers", removed);
            self.install(next);
            self.update_metrics(|m| m.pruned += removed as u64);
        }
        removed
    }

    fn on_completion(&mut self, done: Completion) {
        let current = self.in_flight.as_ref().map(InFlight::seq);
        let seq = match &done {
            Completion::Pulled { seq, .. } | Completion::Pushed { seq, .. } => *seq,
        };
        if current != Some(seq) {
            log::debug!("Dropping completion for finished operation #{}", seq);
            return;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };

        match (in_flight, done) {
            (
                InFlight::Revalidate { op_id, reply, .. },
                Completion::Pulled {
                    predicate, outcome, ..
                },
            ) => {
                let result = self.apply_pull(&op_id, predicate, outcome);
                let _ = reply.send(result);
            }
            (
                InFlight::Write {
                    seq, mut report, reply,
                },
                Completion::Pulled {
                    predicate, outcome, ..
                },
            ) => {
                let op_id = report.op_id.clone();
                let result = self.apply_pull(&op_id, predicate, outcome);
                let can_push = match result {
                    RevalidateOutcome::Merged | RevalidateOutcome::Unchanged => true,
                    RevalidateOutcome::Failed => self.etag.is_some(),
                };
                if can_push {
                    report.enter(WriteState::Merged);
                    report.push_attempts += 1;
                    self.spawn_push(seq);
                    self.in_flight = Some(InFlight::Write { seq, report, reply });
                } else {
                    log::warn!("[{}] Write abandoned: no remote version known", op_id);
                    report.enter(WriteState::Failed);
                    let _ = reply.send(report);
                }
            }
            (
                InFlight::Write {
                    seq, mut report, reply,
                },
                Completion::Pushed {
                    document, outcome, ..
                },
            ) => {
                self.on_push_result(seq, &mut report, &document, outcome);
                if report.final_state().is_terminal() {
                    let _ = reply.send(report);
                } else {
                    self.in_flight = Some(InFlight::Write { seq, report, reply });
                }
            }
            (InFlight::Revalidate { op_id, .. }, Completion::Pushed { .. }) => {
                log::error!("[{}] Unexpected push result during revalidation", op_id);
            }
        }
    }

    fn apply_pull(
        &mut self,
        op_id: &OpId,
        predicate: Option<ETag>,
        outcome: PullOutcome,
    ) -> RevalidateOutcome {
        // The queue stays parked while a pull is in flight, so the known
        // version cannot move under it; a mismatch keeps the local copy.
        if predicate != self.etag {
            log::warn!("[{}] Pull answered for an outdated version, dropped", op_id);
            return RevalidateOutcome::Unchanged;
        }

        let now = self.clock.now();
        match outcome {
            PullOutcome::Updated { document, etag } => {
                let merged = merge_documents(&self.document, &document, now);
                log::info!(
                    "[{}] Merged remote document: {} timers, etag {}",
                    op_id,
                    merged.len(),
                    etag.as_ref().map(ETag::as_str).unwrap_or("-")
                );
                self.etag = etag;
                self.install(merged);
                self.update_metrics(|m| {
                    m.pulls_updated += 1;
                    m.last_pull = Some(now);
                });
                RevalidateOutcome::Merged
            }
            PullOutcome::Unchanged => {
                log::debug!("[{}] Remote unchanged", op_id);
                self.update_metrics(|m| {
                    m.pulls_unchanged += 1;
                    m.last_pull = Some(now);
                });
                RevalidateOutcome::Unchanged
            }
            PullOutcome::Failed(e) => {
                log::warn!("[{}] Pull failed, keeping local copy: {}", op_id, e);
                self.update_metrics(|m| m.failures += 1);
                RevalidateOutcome::Failed
            }
        }
    }

    fn on_push_result(
        &mut self,
        seq: u64,
        report: &mut WriteReport,
        pushed: &Arc<SyncDocument>,
        outcome: PushOutcome,
    ) {
        let op_id = report.op_id.clone();
        match outcome {
            PushOutcome::Accepted { etag } => {
                log::info!(
                    "[{}] Push accepted, etag {}",
                    op_id,
                    etag.as_ref().map(ETag::as_str).unwrap_or("-")
                );
                self.etag = etag;
                if Arc::ptr_eq(pushed, &self.document) {
                    self.unpushed = false;
                }
                self.publish();
                self.update_metrics(|m| m.pushes += 1);
                report.enter(WriteState::Pushed);
            }
            PushOutcome::Conflict => {
                self.update_metrics(|m| m.conflicts += 1);
                report.enter(WriteState::ConflictDetected);
                let attempt = report.push_attempts;
                if self.policy.allows_attempt(attempt) {
                    log::info!("[{}] Version conflict, revalidating (retry {})", op_id, attempt);
                    report.enter(WriteState::Revalidating);
                    self.spawn_pull(seq, self.policy.delay_for_attempt(attempt));
                } else {
                    log::warn!(
                        "{}",
                        SyncError::ConflictExhausted {
                            op_id: op_id.to_string(),
                            attempts: attempt,
                        }
                    );
                    self.update_metrics(|m| m.failures += 1);
                    report.enter(WriteState::Failed);
                }
            }
            PushOutcome::Failed(e) => {
                log::warn!("[{}] Push failed: {}", op_id, e);
                self.update_metrics(|m| m.failures += 1);
                report.enter(WriteState::Failed);
            }
        }
    }

    fn spawn_pull(&self, seq: u64, delay: Duration) {
        let store = self.store.clone();
        let predicate = self.etag.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let outcome = store.pull(predicate.as_ref()).await;
            let _ = completions.send(Completion::Pulled {
                seq,
                predicate,
                outcome,
            });
        });
    }

    fn spawn_push(&self, seq: u64) {
        let store = self.store.clone();
        let document = self.document.clone();
        let expected = self.etag.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let outcome = store.push(&document, expected.as_ref()).await;
            let _ = completions.send(Completion::Pushed {
                seq,
                document,
                outcome,
            });
        });
    }

    fn install(&mut self, document: SyncDocument) {
        self.document = Arc::new(document);
        self.publish();
    }

    fn publish(&self) {
        self.publisher.send_replace(Snapshot {
            document: self.document.clone(),
            etag: self.etag.clone(),
            unpushed: self.unpushed,
        });
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn update_metrics(&self, update: impl FnOnce(&mut SyncMetrics)) {
        if let Ok(mut metrics) = self.metrics.lock() {
            update(&mut metrics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timershare_network::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, Arc<ClockSkewEstimator>, SyncActor) {
        let clock = Arc::new(ClockSkewEstimator::system());
        let store = Arc::new(MemoryStore::new(&SyncDocument::new(clock.now())));
        let actor = SyncActor::spawn(store.clone(), clock.clone(), RetryPolicy::with_retries(1));
        (store, clock, actor)
    }

    fn record(clock: &ClockSkewEstimator, key: &str, secs: u64) -> TimerRecord {
        TimerRecord::new(key, Duration::from_secs(secs), "alice", clock.now())
    }

    #[tokio::test]
    async fn test_upsert_publishes_snapshot() {
        let (_store, clock, actor) = setup();
        let mut updates = actor.subscribe();

        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();

        assert!(updates.has_changed().unwrap());
        let snapshot = actor.snapshot();
        assert!(snapshot.document.get("nether").is_some());
        assert_eq!(snapshot.document.stats.total_timers_created, 1);
        assert!(snapshot.etag.is_none());
    }

    #[tokio::test]
    async fn test_invalid_record_rejected() {
        let (_store, clock, actor) = setup();
        let mut bad = record(&clock, "nether", 90);
        bad.initial_duration = Duration::from_secs(5000);

        let result = actor.apply_local_upsert(bad).await;
        assert!(matches!(result, Err(SyncError::InvalidRecord(_))));
        assert!(actor.snapshot().document.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_keeps_existing_phase() {
        let (_store, clock, actor) = setup();
        actor
            .apply_local_upsert(record(&clock, "nether", 90).with_phase("dusk", "Dusk"))
            .await
            .unwrap();
        actor
            .apply_local_upsert(record(&clock, "nether", 300).with_phase("night", "Night"))
            .await
            .unwrap();

        let snapshot = actor.snapshot();
        let stored = snapshot.document.get("nether").unwrap();
        assert_eq!(stored.predicted_phase, "dusk");
        assert_eq!(stored.initial_duration, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_push_without_etag_revalidates_first() {
        let (store, clock, actor) = setup();
        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();

        let report = actor.attempt_push(OpId::new()).await.unwrap();
        assert_eq!(
            report.transitions,
            vec![
                WriteState::Pending,
                WriteState::Revalidating,
                WriteState::Merged,
                WriteState::Pushed
            ]
        );
        assert_eq!(store.stats().gets, 1);
        assert_eq!(store.stats().posts, 1);
        assert_eq!(actor.snapshot().etag, store.etag());
    }

    #[tokio::test]
    async fn test_push_with_etag_goes_straight_out() {
        let (store, clock, actor) = setup();
        actor.revalidate_and_merge(OpId::new()).await.unwrap();
        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();

        let report = actor.attempt_push(OpId::new()).await.unwrap();
        assert_eq!(report.transitions, vec![WriteState::Pending, WriteState::Pushed]);
        assert_eq!(store.document().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revalidate_unchanged_and_failed_keep_state() {
        let (store, clock, actor) = setup();
        assert_eq!(
            actor.revalidate_and_merge(OpId::new()).await.unwrap(),
            RevalidateOutcome::Merged
        );
        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();

        assert_eq!(
            actor.revalidate_and_merge(OpId::new()).await.unwrap(),
            RevalidateOutcome::Unchanged
        );
        store.fail_next_pulls(1);
        assert_eq!(
            actor.revalidate_and_merge(OpId::new()).await.unwrap(),
            RevalidateOutcome::Failed
        );
        assert!(actor.snapshot().document.get("nether").is_some());

        let metrics = actor.metrics();
        assert_eq!(metrics.pulls_updated, 1);
        assert_eq!(metrics.pulls_unchanged, 1);
        assert_eq!(metrics.failures, 1);
        assert!(metrics.last_pull.is_some());
    }

    #[tokio::test]
    async fn test_conflict_retried_once_then_pushed() {
        let (store, clock, actor) = setup();
        actor.revalidate_and_merge(OpId::new()).await.unwrap();
        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();
        store.force_conflicts(1);

        let report = actor.attempt_push(OpId::new()).await.unwrap();
        assert_eq!(
            report.transitions,
            vec![
                WriteState::Pending,
                WriteState::ConflictDetected,
                WriteState::Revalidating,
                WriteState::Merged,
                WriteState::Pushed
            ]
        );
        assert_eq!(report.push_attempts, 2);
        assert_eq!(actor.metrics().conflicts, 1);
    }

    #[tokio::test]
    async fn test_repeated_conflicts_end_as_failure() {
        let (store, clock, actor) = setup();
        actor.revalidate_and_merge(OpId::new()).await.unwrap();
        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();
        store.force_conflicts(5);

        let report = actor.attempt_push(OpId::new()).await.unwrap();
        assert_eq!(report.final_state(), WriteState::Failed);
        assert_eq!(report.push_attempts, 2);
        assert_eq!(report.conflicts(), 2);
        assert_eq!(store.stats().posts, 2);
        assert!(actor.snapshot().document.get("nether").is_some());
    }

    #[tokio::test]
    async fn test_failed_push_leaves_state_untouched() {
        let (store, clock, actor) = setup();
        actor.revalidate_and_merge(OpId::new()).await.unwrap();
        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();
        let before = actor.snapshot();
        store.fail_next_pushes(1);

        let report = actor.attempt_push(OpId::new()).await.unwrap();
        assert_eq!(report.final_state(), WriteState::Failed);

        let after = actor.snapshot();
        assert_eq!(after.etag, before.etag);
        assert_eq!(after.document, before.document);
    }

    #[tokio::test]
    async fn test_unpushed_flag_cleared_only_by_accepted_push() {
        let (store, clock, actor) = setup();
        assert!(!actor.snapshot().unpushed);

        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();
        assert!(actor.snapshot().unpushed);

        store.fail_next_pushes(1);
        let report = actor.write(OpId::new()).await.unwrap();
        assert_eq!(report.final_state(), WriteState::Failed);
        assert!(actor.snapshot().unpushed);

        store.force_conflicts(2);
        let report = actor.write(OpId::new()).await.unwrap();
        assert_eq!(report.final_state(), WriteState::Failed);
        assert!(actor.snapshot().unpushed);

        let report = actor.write(OpId::new()).await.unwrap();
        assert!(report.is_pushed());
        assert!(!actor.snapshot().unpushed);
        assert!(store.document().unwrap().get("nether").is_some());
    }

    #[tokio::test]
    async fn test_write_without_any_known_version_fails() {
        let (store, clock, actor) = setup();
        actor.apply_local_upsert(record(&clock, "nether", 90)).await.unwrap();
        store.fail_next_pulls(1);

        let report = actor.write(OpId::new()).await.unwrap();
        assert_eq!(report.final_state(), WriteState::Failed);
        assert_eq!(report.push_attempts, 0);
        assert_eq!(store.stats().posts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_removes_expired() {
        let (_store, clock, actor) = setup();
        actor.apply_local_upsert(record(&clock, "nether", 10)).await.unwrap();
        actor.apply_local_upsert(record(&clock, "end", 100)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(actor.prune_expired().await.unwrap(), 1);

        let snapshot = actor.snapshot();
        assert!(snapshot.document.get("nether").is_none());
        assert!(snapshot.document.get("end").is_some());
        assert_eq!(actor.metrics().pruned, 1);
    }

    #[tokio::test]
    async fn test_commands_run_in_submission_order() {
        let clock = Arc::new(ClockSkewEstimator::system());
        let store = Arc::new(
            MemoryStore::new(&SyncDocument::new(clock.now())).with_latency(Duration::from_millis(20)),
        );
        let actor = SyncActor::spawn(store.clone(), clock.clone(), RetryPolicy::with_retries(1));

        // the upsert is queued behind the in-flight pull and must not be lost by its merge
        let pull = actor.revalidate_and_merge(OpId::new());
        let upsert = actor.apply_local_upsert(record(&clock, "nether", 90));
        let (pulled, upserted) = tokio::join!(pull, upsert);

        assert_eq!(pulled.unwrap(), RevalidateOutcome::Merged);
        upserted.unwrap();
        assert!(actor.snapshot().document.get("nether").is_some());
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let (_store, clock, actor) = setup();
        actor.shutdown();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!actor.is_running());
        let result = actor.apply_local_upsert(record(&clock, "nether", 90)).await;
        assert!(matches!(result, Err(SyncError::ActorStopped)));
    }
}
