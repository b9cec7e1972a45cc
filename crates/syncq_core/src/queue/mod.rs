//! The durable operation queue.

mod state;

use crate::codec::{decode_operation, encode_operation};
use crate::config::QueueConfig;
use crate::dir::QueueDir;
use crate::error::{CoreError, CoreResult};
use crate::journal::{Journal, JournalRecord};
use crate::operation::{
    NewOperation, Operation, OperationId, OperationStatus, Payload, StatusCounts,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use state::QueueState;
use std::path::Path;
use syncq_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// A durable, priority-ordered queue of operations.
///
/// Every mutation appends one record to the journal before the in-memory
/// state changes, so an acknowledged write survives a crash. Reads return
/// point-in-time clones.
///
/// The queue is `Send + Sync`; share it with `Arc`. Writers serialize on the
/// journal lock; readers only take the state lock.
///
/// # Example
///
/// ```rust
/// use syncq_core::{Method, NewOperation, OperationQueue, Priority};
///
/// let queue = OperationQueue::<String>::open_in_memory().unwrap();
/// queue.add(NewOperation::new("note", Method::Post, "/notes", "a".to_string())).unwrap();
/// let urgent = queue
///     .add(NewOperation::new("note", Method::Post, "/notes", "b".to_string())
///         .with_priority(Priority::Critical))
///     .unwrap();
///
/// assert_eq!(queue.get_pending()[0].id, urgent);
/// ```
pub struct OperationQueue<T> {
    state: RwLock<QueueState<T>>,
    journal: Mutex<Journal>,
    config: QueueConfig,
    dir: Option<QueueDir>,
}

impl<T> std::fmt::Debug for OperationQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue")
            .field("config", &self.config)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl<T: Payload> OperationQueue<T> {
    /// Opens the queue stored in directory `path` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `QueueLocked` if another process has the queue open, or a
    /// corruption error if the journal is damaged.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, QueueConfig::default())
    }

    /// Opens the queue stored in directory `path`.
    pub fn open_with_config(path: &Path, config: QueueConfig) -> CoreResult<Self> {
        let dir = QueueDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.journal_path())?;
        let mut queue = Self::with_backend(Box::new(backend), config)?;
        tracing::info!(
            "opened queue at {} with {} operations",
            dir.path().display(),
            queue.len()
        );
        queue.dir = Some(dir);
        Ok(queue)
    }

    /// Creates an empty, non-persistent queue.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::with_backend(Box::new(InMemoryBackend::new()), QueueConfig::default())
    }

    /// Opens a queue over an arbitrary backend, replaying its journal.
    ///
    /// Operations found in `Syncing` were interrupted by a crash before their
    /// outcome was recorded; they are returned to `Pending`.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: QueueConfig) -> CoreResult<Self> {
        let (mut journal, records) = Journal::open(backend, config.sync_on_write)?;

        let mut state = QueueState::new();
        for record in records {
            match record {
                JournalRecord::Put { operation } => state.upsert(decode_operation(&operation)?),
                JournalRecord::Remove { id } => {
                    state.remove(&id);
                }
                JournalRecord::Clear => state.clear(),
            }
        }

        let interrupted: Vec<Operation<T>> = state
            .operations()
            .filter(|op| op.status == OperationStatus::Syncing)
            .cloned()
            .collect();
        for mut op in interrupted {
            tracing::warn!("operation {} was in flight at shutdown, requeueing", op.id);
            op.status = OperationStatus::Pending;
            journal.append(&JournalRecord::Put {
                operation: encode_operation(&op)?,
            })?;
            state.upsert(op);
        }

        Ok(Self {
            state: RwLock::new(state),
            journal: Mutex::new(journal),
            config,
            dir: None,
        })
    }

    /// Returns the queue directory, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(QueueDir::path)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Adds a new pending operation. Durable before returning.
    pub fn add(&self, new: NewOperation<T>) -> CoreResult<OperationId> {
        let mut journal = self.journal.lock();
        let sequence = self.state.read().next_sequence();
        let op = Operation::from_new(new, sequence, Utc::now());
        let id = op.id;

        self.persist(&mut journal, op)?;
        tracing::debug!("queued operation {}", id);
        self.maybe_compact(&mut journal);
        Ok(id)
    }

    /// Returns a snapshot of one operation.
    pub fn get(&self, id: &OperationId) -> CoreResult<Operation<T>> {
        self.state
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(*id))
    }

    /// Returns every operation in insertion order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Operation<T>> {
        let mut all: Vec<_> = self.state.read().operations().cloned().collect();
        all.sort_by_key(|op| op.sequence);
        all
    }

    /// Returns pending operations: priority descending, then oldest first,
    /// then insertion order.
    #[must_use]
    pub fn get_pending(&self) -> Vec<Operation<T>> {
        self.state.read().pending().cloned().collect()
    }

    /// Returns pending operations whose retry backoff has elapsed at `now`,
    /// in the same order as [`Self::get_pending`].
    #[must_use]
    pub fn get_ready(&self, now: DateTime<Utc>) -> Vec<Operation<T>> {
        self.state
            .read()
            .pending()
            .filter(|op| op.is_ready(now))
            .cloned()
            .collect()
    }

    /// Returns operations with the given status in insertion order.
    #[must_use]
    pub fn list_by_status(&self, status: OperationStatus) -> Vec<Operation<T>> {
        let mut ops: Vec<_> = self
            .state
            .read()
            .operations()
            .filter(|op| op.status == status)
            .cloned()
            .collect();
        ops.sort_by_key(|op| op.sequence);
        ops
    }

    /// Number of pending operations.
    #[must_use]
    pub fn count_pending(&self) -> usize {
        self.state.read().pending_len()
    }

    /// Number of operations per status.
    #[must_use]
    pub fn count_by_status(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for op in self.state.read().operations() {
            counts.record(op.status);
        }
        counts
    }

    /// Total number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// Returns true if the queue holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the status of an operation. No transition check is made.
    pub fn update_status(&self, id: &OperationId, status: OperationStatus) -> CoreResult<()> {
        self.mutate(id, |op| {
            op.status = status;
            Ok(())
        })
        .map(drop)
    }

    /// Marks an operation as in flight, recording the attempt time.
    pub fn mark_syncing(&self, id: &OperationId, at: DateTime<Utc>) -> CoreResult<()> {
        self.mutate(id, |op| {
            op.status = OperationStatus::Syncing;
            op.last_attempt_at = Some(at);
            Ok(())
        })
        .map(drop)
    }

    /// Increments the retry count.
    ///
    /// # Errors
    ///
    /// `RetryBudgetExhausted` if the count already equals `max_retries`.
    pub fn increment_retry(&self, id: &OperationId) -> CoreResult<u32> {
        self.mutate(id, |op| {
            check_budget(op)?;
            op.retry_count += 1;
            Ok(())
        })
        .map(|op| op.retry_count)
    }

    /// Returns true if the operation may be retried again.
    pub fn can_retry(&self, id: &OperationId) -> CoreResult<bool> {
        self.state
            .read()
            .get(id)
            .map(Operation::can_retry)
            .ok_or_else(|| CoreError::not_found(*id))
    }

    /// Consumes one retry and returns the operation to `Pending`, gated
    /// until `not_before`.
    ///
    /// # Errors
    ///
    /// `RetryBudgetExhausted` if the count already equals `max_retries`.
    pub fn schedule_retry(&self, id: &OperationId, not_before: DateTime<Utc>) -> CoreResult<u32> {
        self.mutate(id, |op| {
            check_budget(op)?;
            op.retry_count += 1;
            op.status = OperationStatus::Pending;
            op.not_before = Some(not_before);
            Ok(())
        })
        .map(|op| op.retry_count)
    }

    /// Marks an operation as permanently failed.
    pub fn set_failed(&self, id: &OperationId, message: impl Into<String>) -> CoreResult<()> {
        let message = message.into();
        self.mutate(id, move |op| {
            op.status = OperationStatus::Failed;
            op.error_message = Some(message);
            Ok(())
        })
        .map(drop)
    }

    /// Parks an operation in `Conflict`, capturing the server's version.
    pub fn set_conflict(&self, id: &OperationId, server_data: T) -> CoreResult<()> {
        self.mutate(id, move |op| {
            op.status = OperationStatus::Conflict;
            op.conflict_data = Some(server_data);
            Ok(())
        })
        .map(drop)
    }

    /// Records a diagnostic message on an operation without changing status.
    pub fn set_error_message(&self, id: &OperationId, message: impl Into<String>) -> CoreResult<()> {
        let message = message.into();
        self.mutate(id, move |op| {
            op.error_message = Some(message);
            Ok(())
        })
        .map(drop)
    }

    /// Replaces an operation with a fresh pending successor.
    ///
    /// The successor keeps the original's type, method, url, priority, retry
    /// ceiling and metadata, and carries `payload` or, if `None`, the
    /// original payload. The original is removed.
    ///
    /// # Errors
    ///
    /// Refuses operations that are currently `Syncing`.
    pub fn resubmit(&self, id: &OperationId, payload: Option<T>) -> CoreResult<OperationId> {
        let mut journal = self.journal.lock();
        let (original, sequence) = {
            let state = self.state.read();
            let original = state.get(id).cloned().ok_or_else(|| CoreError::not_found(*id))?;
            (original, state.next_sequence())
        };

        if original.status == OperationStatus::Syncing {
            return Err(CoreError::invalid_operation(format!(
                "operation {id} is being synced and cannot be resubmitted"
            )));
        }

        let payload = payload.unwrap_or_else(|| original.payload.clone());
        let successor = original.successor(payload, sequence);
        let successor_id = successor.id;

        self.persist(&mut journal, successor)?;
        journal.append(&JournalRecord::Remove { id: *id })?;
        self.state.write().remove(id);

        tracing::debug!("resubmitted {} as {}", id, successor_id);
        self.maybe_compact(&mut journal);
        Ok(successor_id)
    }

    /// Removes every completed operation. Returns how many were removed.
    pub fn remove_completed(&self) -> CoreResult<usize> {
        let mut journal = self.journal.lock();
        let completed: Vec<OperationId> = self
            .state
            .read()
            .operations()
            .filter(|op| op.status == OperationStatus::Completed)
            .map(|op| op.id)
            .collect();

        for id in &completed {
            journal.append(&JournalRecord::Remove { id: *id })?;
            self.state.write().remove(id);
        }

        if !completed.is_empty() {
            tracing::debug!("pruned {} completed operations", completed.len());
            self.maybe_compact(&mut journal);
        }
        Ok(completed.len())
    }

    /// Removes one operation.
    pub fn remove(&self, id: &OperationId) -> CoreResult<()> {
        let mut journal = self.journal.lock();
        if self.state.read().get(id).is_none() {
            return Err(CoreError::not_found(*id));
        }

        journal.append(&JournalRecord::Remove { id: *id })?;
        self.state.write().remove(id);
        self.maybe_compact(&mut journal);
        Ok(())
    }

    /// Removes every operation.
    pub fn clear(&self) -> CoreResult<()> {
        let mut journal = self.journal.lock();
        journal.append(&JournalRecord::Clear)?;
        self.state.write().clear();
        self.maybe_compact(&mut journal);
        Ok(())
    }

    /// Rewrites the journal as a snapshot of the live operations.
    pub fn compact(&self) -> CoreResult<()> {
        let mut journal = self.journal.lock();
        self.compact_locked(&mut journal)
    }

    /// Returns the journal size in bytes.
    pub fn journal_size(&self) -> CoreResult<u64> {
        self.journal.lock().size()
    }

    /// Reads an operation, applies `f` to a copy, journals the result and
    /// then publishes it.
    fn mutate<F>(&self, id: &OperationId, f: F) -> CoreResult<Operation<T>>
    where
        F: FnOnce(&mut Operation<T>) -> CoreResult<()>,
    {
        let mut journal = self.journal.lock();
        let mut op = self
            .state
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(*id))?;

        f(&mut op)?;
        self.persist(&mut journal, op.clone())?;
        self.maybe_compact(&mut journal);
        Ok(op)
    }

    fn persist(&self, journal: &mut Journal, op: Operation<T>) -> CoreResult<()> {
        journal.append(&JournalRecord::Put {
            operation: encode_operation(&op)?,
        })?;
        self.state.write().upsert(op);
        Ok(())
    }

    /// Compacts once the journal is large and mostly dead.
    ///
    /// Runs after a mutation is already durable, so failures are logged and
    /// left for the next attempt rather than reported against that mutation.
    fn maybe_compact(&self, journal: &mut Journal) {
        let threshold = self.config.compact_threshold;
        if threshold == 0 {
            return;
        }
        let size = match journal.size() {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!("skipping automatic compaction: {}", e);
                return;
            }
        };
        if size <= threshold {
            return;
        }

        let live = self.state.read().len();
        if journal.record_count() < live.saturating_mul(2).max(1) {
            return;
        }
        if let Err(e) = self.compact_locked(journal) {
            tracing::warn!("automatic compaction failed: {}", e);
        }
    }

    fn compact_locked(&self, journal: &mut Journal) -> CoreResult<()> {
        let before = journal.size()?;
        let mut ops: Vec<Operation<T>> = self.state.read().operations().cloned().collect();
        ops.sort_by_key(|op| op.sequence);

        let records = ops
            .iter()
            .map(|op| {
                Ok(JournalRecord::Put {
                    operation: encode_operation(op)?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        journal.rewrite(&records)?;
        tracing::info!(
            "compacted journal from {} to {} bytes ({} operations)",
            before,
            journal.size()?,
            records.len()
        );
        Ok(())
    }
}

fn check_budget<T>(op: &Operation<T>) -> CoreResult<()> {
    if op.can_retry() {
        Ok(())
    } else {
        Err(CoreError::RetryBudgetExhausted {
            id: op.id,
            max_retries: op.max_retries,
        })
    }
}
