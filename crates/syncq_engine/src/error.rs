//! Error types for the sync engine.

use syncq_core::CoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The queue failed to read or persist state.
    #[error("queue error: {0}")]
    Queue(#[from] CoreError),

    /// The executor reported a failure.
    #[error("executor error: {message}")]
    Executor {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The executor did not finish in time.
    #[error("executor timed out")]
    Timeout,

    /// The connectivity signal is offline.
    #[error("not connected")]
    NotConnected,

    /// Passes are paused.
    #[error("sync is paused")]
    Paused,

    /// A conflict kept recurring after resolution.
    #[error("conflict still unresolved after {limit} resolution attempts")]
    ResolutionLimitExceeded {
        /// The configured limit.
        limit: u32,
    },
}

impl SyncError {
    /// Creates a retryable executor error.
    pub fn executor_retryable(message: impl Into<String>) -> Self {
        Self::Executor {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable executor error.
    pub fn executor_fatal(message: impl Into<String>) -> Self {
        Self::Executor {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Executor { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }
}
