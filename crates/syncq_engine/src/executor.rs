//! The executor boundary: the caller-supplied remote call.

use crate::conflict::ConflictInfo;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use syncq_core::{Operation, Payload};
use thiserror::Error;

/// A failed attempt, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    /// What went wrong.
    pub message: String,
    /// Whether another attempt may succeed.
    pub retryable: bool,
}

impl ExecutionError {
    /// A transient failure (network down, 5xx, throttling).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A permanent rejection (validation error, 4xx).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<ExecutionError> for crate::SyncError {
    fn from(err: ExecutionError) -> Self {
        crate::SyncError::Executor {
            message: err.message,
            retryable: err.retryable,
        }
    }
}

/// What happened when an operation was sent.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome<T> {
    /// The remote system accepted the operation.
    Success {
        /// Optional response body.
        response: Option<serde_json::Value>,
    },
    /// The attempt failed.
    Failure(ExecutionError),
    /// The remote state diverges from what the client assumed.
    Conflict(ConflictInfo<T>),
}

impl<T> ExecutionOutcome<T> {
    /// Success without a response body.
    pub fn success() -> Self {
        Self::Success { response: None }
    }
}

/// Performs the remote call for one operation.
///
/// Implementations must not mutate the operation; the orchestrator owns
/// every state transition.
pub trait Executor<T>: Send + Sync {
    /// Sends `operation` and reports the outcome.
    fn execute(&self, operation: &Operation<T>) -> impl Future<Output = ExecutionOutcome<T>> + Send;
}

/// A scripted reply for [`MockExecutor`].
#[derive(Debug, Clone)]
pub enum MockResponse<T> {
    /// Accept the operation.
    Success(Option<serde_json::Value>),
    /// Fail the attempt.
    Failure(ExecutionError),
    /// Report a conflict against the given server state.
    Conflict {
        /// Server payload.
        server_data: T,
        /// Server version.
        server_timestamp: DateTime<Utc>,
    },
}

/// An executor for testing.
///
/// Replies are taken from a FIFO script; once it is empty every call gets
/// the default reply, which starts as success.
#[derive(Debug)]
pub struct MockExecutor<T> {
    script: Mutex<VecDeque<MockResponse<T>>>,
    default: Mutex<MockResponse<T>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<Operation<T>>>,
}

impl<T> Default for MockExecutor<T> {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(MockResponse::Success(None)),
            delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> MockExecutor<T> {
    /// Creates a mock that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next unscripted call.
    pub fn push_response(&self, response: MockResponse<T>) {
        self.script.lock().push_back(response);
    }

    /// Sets the reply used once the script is exhausted.
    pub fn set_default(&self, response: MockResponse<T>) {
        *self.default.lock() = response;
    }

    /// Makes every call take `delay` before replying.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Operations received so far, in call order.
    pub fn calls(&self) -> Vec<Operation<T>> {
        self.calls.lock().clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Payload> Executor<T> for MockExecutor<T> {
    fn execute(&self, operation: &Operation<T>) -> impl Future<Output = ExecutionOutcome<T>> + Send {
        self.calls.lock().push(operation.clone());
        let response = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default.lock().clone());
        let outcome = match response {
            MockResponse::Success(response) => ExecutionOutcome::Success { response },
            MockResponse::Failure(err) => ExecutionOutcome::Failure(err),
            MockResponse::Conflict {
                server_data,
                server_timestamp,
            } => ExecutionOutcome::Conflict(ConflictInfo::for_operation(
                operation,
                server_data,
                server_timestamp,
            )),
        };
        let delay = *self.delay.lock();

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncq_core::{Method, NewOperation};

    fn op() -> Operation<String> {
        Operation::from_new(
            NewOperation::new("t", Method::Delete, "/x", "p".to_string()),
            0,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn mock_follows_script_then_default() {
        let mock = MockExecutor::new();
        mock.push_response(MockResponse::Failure(ExecutionError::retryable("503")));
        mock.push_response(MockResponse::Conflict {
            server_data: "server".to_string(),
            server_timestamp: Utc::now(),
        });

        let op = op();
        assert!(matches!(
            mock.execute(&op).await,
            ExecutionOutcome::Failure(ExecutionError { retryable: true, .. })
        ));
        match mock.execute(&op).await {
            ExecutionOutcome::Conflict(info) => {
                assert_eq!(info.client_data, "p");
                assert_eq!(info.server_data, "server");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(matches!(mock.execute(&op).await, ExecutionOutcome::Success { .. }));
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn execution_error_converts() {
        let err: crate::SyncError = ExecutionError::permanent("400 bad request").into();
        assert!(!err.is_retryable());
        assert_eq!(ExecutionError::retryable("x").to_string(), "x");
    }
}
