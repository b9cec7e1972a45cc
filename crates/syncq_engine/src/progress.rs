//! Progress, status and statistics reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use syncq_core::OperationId;

/// Progress of the current (or last) pass.
///
/// Reset at the start of every pass and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    /// Operations selected for this pass.
    pub total: usize,
    /// Operations the remote system accepted.
    pub completed: usize,
    /// Operations that failed permanently.
    pub failed: usize,
    /// Operations that hit a conflict (counted once per original).
    pub conflicts: usize,
    /// Whether a pass is running.
    pub is_syncing: bool,
    /// The operation being processed.
    pub current_operation: Option<OperationId>,
}

impl SyncProgress {
    /// Fresh progress for a pass over `total` operations.
    #[must_use]
    pub fn starting(total: usize) -> Self {
        Self {
            total,
            is_syncing: true,
            ..Self::default()
        }
    }
}

/// Observable orchestrator state.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Mirror of the connectivity signal.
    pub is_online: bool,
    /// Whether a pass is running.
    pub is_syncing: bool,
    /// Whether new passes are suppressed.
    pub is_paused: bool,
    /// Pending operations in the queue.
    pub pending_count: usize,
    /// Progress of the current or last pass.
    pub progress: SyncProgress,
    /// Last orchestration-level error.
    pub error: Option<String>,
}

/// Summary of one finished pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Operations selected for the pass.
    pub total: usize,
    /// Operations completed.
    pub completed: usize,
    /// Operations failed permanently.
    pub failed: usize,
    /// Operations that conflicted.
    pub conflicts: usize,
    /// Operations sent back to pending with a backoff.
    pub retried: usize,
    /// Successor operations created by conflict resolution.
    pub resubmitted: usize,
    /// Conflicts left for a human.
    pub parked: usize,
    /// Operations whose processing hit a queue error.
    pub errors: usize,
    /// Completed operations pruned after the pass.
    pub pruned: usize,
    /// Wall-clock duration.
    pub duration: Duration,
}

/// Cumulative statistics across passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that ran to the end.
    pub passes_completed: u64,
    /// Operations completed.
    pub operations_completed: u64,
    /// Operations failed permanently.
    pub operations_failed: u64,
    /// Conflicts encountered.
    pub conflicts_encountered: u64,
    /// Retries scheduled.
    pub retries: u64,
    /// End of the last pass.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record_pass(&mut self, report: &PassReport) {
        self.passes_completed += 1;
        self.operations_completed += report.completed as u64;
        self.operations_failed += report.failed as u64;
        self.conflicts_encountered += report.conflicts as u64;
        self.retries += report.retried as u64;
        self.last_sync_time = Some(Utc::now());
    }
}
