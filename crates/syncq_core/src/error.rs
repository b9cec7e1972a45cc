//! Error types for the syncq queue.

use crate::operation::OperationId;
use std::io;
use thiserror::Error;

/// Result type for queue operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in queue operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] syncq_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A journal payload could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// The journal is corrupted or in an unknown format.
    #[error("journal corruption: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A journal record failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the record in the journal.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// No operation with this ID exists in the queue.
    #[error("operation not found: {id}")]
    NotFound {
        /// The missing operation.
        id: OperationId,
    },

    /// Another process holds the queue directory lock.
    #[error("queue locked: another process has exclusive access")]
    QueueLocked,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation was refused.
        message: String,
    },

    /// The operation has used every retry it is allowed.
    #[error("retry budget exhausted for {id} ({max_retries} retries)")]
    RetryBudgetExhausted {
        /// The operation.
        id: OperationId,
        /// Its retry ceiling.
        max_retries: u32,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(id: OperationId) -> Self {
        Self::NotFound { id }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the journal itself is damaged.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. } | Self::ChecksumMismatch { .. })
    }
}
