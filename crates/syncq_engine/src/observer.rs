//! Lifecycle hooks invoked during a pass.

use crate::conflict::ConflictInfo;
use crate::executor::ExecutionError;
use syncq_core::Operation;

/// Receives per-operation outcomes.
///
/// Hooks run synchronously inside the pass, after the queue has recorded the
/// outcome. Keep them short; all have no-op defaults.
pub trait SyncObserver<T>: Send + Sync {
    /// The remote system accepted `operation`.
    fn on_success(&self, operation: &Operation<T>, response: Option<&serde_json::Value>) {
        let _ = (operation, response);
    }

    /// `operation` failed permanently.
    fn on_failure(&self, operation: &Operation<T>, error: &ExecutionError) {
        let _ = (operation, error);
    }

    /// `operation` conflicted with the server.
    fn on_conflict(&self, operation: &Operation<T>, conflict: &ConflictInfo<T>) {
        let _ = (operation, conflict);
    }
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<T> SyncObserver<T> for NoopObserver {}
