//! The sync orchestrator: drains the queue through the executor.

use crate::config::SyncConfig;
use crate::conflict::{resolve_conflict_with, MergePayload};
use crate::error::{SyncError, SyncResult};
use crate::executor::{ExecutionError, ExecutionOutcome, Executor};
use crate::observer::{NoopObserver, SyncObserver};
use crate::progress::{PassReport, SyncProgress, SyncStats, SyncStatus};
use crate::resolver::{ConflictResolver, LastWriteWins};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use syncq_core::{Operation, OperationQueue, OperationStatus, Payload};
use tokio::sync::{watch, Notify};

/// Drives queued operations through an [`Executor`].
///
/// At most one pass runs at a time; concurrent [`sync_now`](Self::sync_now)
/// calls return `Ok(None)`. Within a pass, operations are processed strictly
/// one after another in queue order.
///
/// Per-operation outcomes:
///
/// - success: `Completed`, pruned at the end of the pass
/// - retryable failure within budget: back to `Pending` with an exponential
///   backoff gate, so it is retried in a later pass
/// - permanent failure or exhausted budget: `Failed`
/// - conflict: parked in `Conflict`, then resolved; a resolution that must
///   be resent replaces the operation with a pending successor that is
///   attempted again immediately, up to `max_conflict_resolutions` times
///
/// The orchestrator starts online and unpaused.
pub struct SyncOrchestrator<T, E, R = LastWriteWins> {
    queue: Arc<OperationQueue<T>>,
    executor: E,
    resolver: R,
    observer: Arc<dyn SyncObserver<T>>,
    config: SyncConfig,
    online: AtomicBool,
    syncing: AtomicBool,
    paused: AtomicBool,
    progress: watch::Sender<SyncProgress>,
    error: RwLock<Option<String>>,
    stats: RwLock<SyncStats>,
    wake: Notify,
}

impl<T, E> SyncOrchestrator<T, E, LastWriteWins>
where
    T: Payload + MergePayload,
    E: Executor<T>,
{
    /// Creates an orchestrator resolving conflicts by last-write-wins.
    pub fn new(queue: Arc<OperationQueue<T>>, executor: E, config: SyncConfig) -> Self {
        let (progress, _) = watch::channel(SyncProgress::default());
        Self {
            queue,
            executor,
            resolver: LastWriteWins,
            observer: Arc::new(NoopObserver),
            config,
            online: AtomicBool::new(true),
            syncing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            progress,
            error: RwLock::new(None),
            stats: RwLock::new(SyncStats::default()),
            wake: Notify::new(),
        }
    }
}

impl<T, E, R> SyncOrchestrator<T, E, R>
where
    T: Payload + MergePayload,
    E: Executor<T>,
    R: ConflictResolver<T>,
{
    /// Replaces the conflict resolver.
    pub fn with_resolver<R2: ConflictResolver<T>>(self, resolver: R2) -> SyncOrchestrator<T, E, R2> {
        SyncOrchestrator {
            queue: self.queue,
            executor: self.executor,
            resolver,
            observer: self.observer,
            config: self.config,
            online: self.online,
            syncing: self.syncing,
            paused: self.paused,
            progress: self.progress,
            error: self.error,
            stats: self.stats,
            wake: self.wake,
        }
    }

    /// Installs lifecycle hooks.
    pub fn with_observer(mut self, observer: impl SyncObserver<T> + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// The queue being drained.
    pub fn queue(&self) -> &Arc<OperationQueue<T>> {
        &self.queue
    }

    /// The executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether the connectivity signal is online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Whether a pass is running.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Whether new passes are suppressed.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pending operations in the queue.
    pub fn pending_count(&self) -> usize {
        self.queue.count_pending()
    }

    /// Progress of the current or last pass.
    pub fn progress(&self) -> SyncProgress {
        self.progress.borrow().clone()
    }

    /// Subscribes to progress updates.
    pub fn subscribe_progress(&self) -> watch::Receiver<SyncProgress> {
        self.progress.subscribe()
    }

    /// Last orchestration-level error.
    pub fn error(&self) -> Option<String> {
        self.error.read().clone()
    }

    /// Cumulative statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Snapshot of the observable state.
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            is_online: self.is_online(),
            is_syncing: self.is_syncing(),
            is_paused: self.is_paused(),
            pending_count: self.pending_count(),
            progress: self.progress(),
            error: self.error(),
        }
    }

    /// Updates connectivity.
    ///
    /// Going from offline to online with pending work wakes the auto-sync
    /// task, if one is running, for an immediate pass.
    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::AcqRel);
        if online != was_online {
            tracing::info!("connectivity changed: {}", if online { "online" } else { "offline" });
        }
        if online && !was_online && self.pending_count() > 0 {
            self.wake.notify_one();
        }
    }

    /// Suppresses future passes. A running pass is not interrupted.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            tracing::info!("sync paused");
        }
    }

    /// Allows passes again.
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::AcqRel) {
            tracing::info!("sync resumed");
            if self.is_online() && self.pending_count() > 0 {
                self.wake.notify_one();
            }
        }
    }

    pub(crate) fn wake(&self) -> &Notify {
        &self.wake
    }

    fn check_can_sync(&self) -> SyncResult<()> {
        if self.is_paused() {
            return Err(SyncError::Paused);
        }
        if !self.is_online() {
            return Err(SyncError::NotConnected);
        }
        Ok(())
    }

    /// Runs one pass over the operations that are ready now.
    ///
    /// Returns `Ok(None)` without doing anything if paused, offline or a
    /// pass is already running. Errors affecting a single operation are
    /// recorded in [`error`](Self::error) and the pass continues; an error
    /// outside any operation ends the pass and is returned.
    pub async fn sync_now(&self) -> SyncResult<Option<PassReport>> {
        if let Err(reason) = self.check_can_sync() {
            tracing::debug!("skipping sync pass: {}", reason);
            return Ok(None);
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("skipping sync pass: already syncing");
            return Ok(None);
        }

        let _guard = PassGuard {
            syncing: &self.syncing,
            progress: &self.progress,
        };
        *self.error.write() = None;

        match self.run_pass().await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                tracing::warn!("sync pass aborted: {}", e);
                self.record_error(&e);
                Err(e)
            }
        }
    }

    async fn run_pass(&self) -> SyncResult<PassReport> {
        let started = Instant::now();
        let snapshot = self.queue.get_ready(Utc::now());
        let mut report = PassReport {
            total: snapshot.len(),
            ..PassReport::default()
        };

        tracing::info!("sync pass started: {} operations", report.total);
        self.progress.send_replace(SyncProgress::starting(report.total));

        for op in snapshot {
            let id = op.id;
            self.progress.send_modify(|p| p.current_operation = Some(id));
            if let Err(e) = self.process(op, &mut report).await {
                tracing::warn!("operation {} not processed: {}", id, e);
                report.errors += 1;
                self.record_error(&e);
                self.release_in_flight();
            }
            self.progress.send_modify(|p| p.current_operation = None);
        }

        report.pruned = self.queue.remove_completed()?;
        report.duration = started.elapsed();
        self.stats.write().record_pass(&report);

        tracing::info!(
            "sync pass finished in {:?}: {} completed, {} failed, {} conflicts, {} retried",
            report.duration,
            report.completed,
            report.failed,
            report.conflicts,
            report.retried
        );
        Ok(report)
    }

    async fn process(&self, op: Operation<T>, report: &mut PassReport) -> SyncResult<()> {
        // The snapshot may be stale if a caller touched the queue mid-pass.
        let mut current = self.queue.get(&op.id)?;
        if !current.is_ready(Utc::now()) {
            tracing::debug!("operation {} no longer ready, skipping", current.id);
            return Ok(());
        }

        let mut resolutions = 0u32;
        loop {
            let attempted_at = Utc::now();
            self.queue.mark_syncing(&current.id, attempted_at)?;
            current.status = OperationStatus::Syncing;
            current.last_attempt_at = Some(attempted_at);

            match self.dispatch(&current).await {
                ExecutionOutcome::Success { response } => {
                    self.queue
                        .update_status(&current.id, OperationStatus::Completed)?;
                    current.status = OperationStatus::Completed;
                    report.completed += 1;
                    self.progress.send_modify(|p| p.completed += 1);
                    tracing::debug!("operation {} completed", current.id);
                    self.observer.on_success(&current, response.as_ref());
                    return Ok(());
                }
                ExecutionOutcome::Failure(error) => {
                    return self.handle_failure(current, &error, report);
                }
                ExecutionOutcome::Conflict(conflict) => {
                    self.queue
                        .set_conflict(&current.id, conflict.server_data.clone())?;
                    current.status = OperationStatus::Conflict;
                    current.conflict_data = Some(conflict.server_data.clone());
                    if resolutions == 0 {
                        report.conflicts += 1;
                        self.progress.send_modify(|p| p.conflicts += 1);
                    }
                    self.observer.on_conflict(&current, &conflict);

                    let resolved = resolve_conflict_with(&conflict, &self.resolver).await;
                    if resolved.requires_user_input {
                        tracing::info!("operation {} awaits manual resolution", current.id);
                        report.parked += 1;
                        return Ok(());
                    }

                    match resolved.data {
                        Some(data) if resolved.should_sync => {
                            let limit = self.config.max_conflict_resolutions;
                            if resolutions >= limit {
                                let reason = SyncError::ResolutionLimitExceeded { limit };
                                tracing::warn!("operation {} parked: {}", current.id, reason);
                                self.queue.set_error_message(&current.id, reason.to_string())?;
                                report.parked += 1;
                                return Ok(());
                            }
                            resolutions += 1;

                            let successor = self.queue.resubmit(&current.id, Some(data))?;
                            tracing::debug!(
                                "conflict on {} resolved as {}, resubmitted as {}",
                                current.id,
                                resolved.resolution,
                                successor
                            );
                            report.resubmitted += 1;
                            current = self.queue.get(&successor)?;
                        }
                        _ => {
                            self.queue
                                .update_status(&current.id, OperationStatus::Completed)?;
                            tracing::debug!(
                                "conflict on {} resolved as {}",
                                current.id,
                                resolved.resolution
                            );
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, op: &Operation<T>) -> ExecutionOutcome<T> {
        let call = self.executor.execute(op);
        match self.config.executor_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                tracing::warn!("operation {} timed out after {:?}", op.id, limit);
                ExecutionOutcome::Failure(ExecutionError::retryable(SyncError::Timeout.to_string()))
            }),
            None => call.await,
        }
    }

    fn handle_failure(
        &self,
        mut op: Operation<T>,
        error: &ExecutionError,
        report: &mut PassReport,
    ) -> SyncResult<()> {
        if error.retryable && op.can_retry() {
            let delay = self.config.retry.delay_for_retry(op.retry_count);
            let retry_count = self
                .queue
                .schedule_retry(&op.id, deadline_after(Utc::now(), delay))?;
            report.retried += 1;
            tracing::debug!(
                "operation {} failed ({}), retry {}/{} in {:?}",
                op.id,
                error,
                retry_count,
                op.max_retries,
                delay
            );
            return Ok(());
        }

        self.queue.set_failed(&op.id, error.message.clone())?;
        op.status = OperationStatus::Failed;
        op.error_message = Some(error.message.clone());
        report.failed += 1;
        self.progress.send_modify(|p| p.failed += 1);
        tracing::warn!("operation {} failed permanently: {}", op.id, error);
        self.observer.on_failure(&op, error);
        Ok(())
    }

    /// Returns operations this pass left in `Syncing` to the pending pool.
    fn release_in_flight(&self) {
        for op in self.queue.list_by_status(OperationStatus::Syncing) {
            if let Err(e) = self.queue.update_status(&op.id, OperationStatus::Pending) {
                tracing::warn!("operation {} left in flight: {}", op.id, e);
            }
        }
    }

    fn record_error(&self, error: &SyncError) {
        let message = error.to_string();
        self.stats.write().last_error = Some(message.clone());
        *self.error.write() = Some(message);
    }
}

/// Clears the syncing flag however the pass ends.
struct PassGuard<'a> {
    syncing: &'a AtomicBool,
    progress: &'a watch::Sender<SyncProgress>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.progress.send_modify(|p| {
            p.is_syncing = false;
            p.current_operation = None;
        });
        self.syncing.store(false, Ordering::Release);
    }
}

fn deadline_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}
