//! # syncq engine
//!
//! Drains a [`syncq_core::OperationQueue`] against a remote system.
//!
//! This crate provides:
//! - The [`Executor`] boundary, where the caller performs the actual remote call
//! - The [`SyncOrchestrator`], which runs one pass at a time over ready operations
//! - Retry with exponential backoff
//! - Conflict detection and pluggable resolution
//! - An auto-sync task driven by a connectivity signal and a timer
//!
//! ## Pass model
//!
//! A pass snapshots the operations that are ready now, processes them one by
//! one in queue order, then prunes the completed ones. Failures are isolated
//! per operation. A pass never runs while paused or offline, and never
//! overlaps another pass.
//!
//! ```rust,no_run
//! use serde_json::json;
//! use std::sync::Arc;
//! use syncq_core::{Method, NewOperation, OperationQueue};
//! use syncq_engine::{MockExecutor, SyncConfig, SyncOrchestrator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = Arc::new(OperationQueue::open_in_memory()?);
//! queue.add(NewOperation::new("rental", Method::Post, "/rentals", json!({"bike": 7})))?;
//!
//! let orchestrator = SyncOrchestrator::new(queue, MockExecutor::new(), SyncConfig::default());
//! let report = orchestrator.sync_now().await?;
//! assert_eq!(report.map(|r| r.completed), Some(1));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auto_sync;
mod config;
mod conflict;
mod error;
mod executor;
mod observer;
mod orchestrator;
mod progress;
mod resolver;

pub use auto_sync::AutoSyncHandle;
pub use config::{RetryConfig, SyncConfig, MIN_SYNC_INTERVAL};
pub use conflict::{
    apply_resolution, last_write_wins, resolve_conflict, resolve_conflict_with, ConflictInfo,
    MergePayload, Resolution, ResolvedConflict,
};
pub use error::{SyncError, SyncResult};
pub use executor::{ExecutionError, ExecutionOutcome, Executor, MockExecutor, MockResponse};
pub use observer::{NoopObserver, SyncObserver};
pub use orchestrator::SyncOrchestrator;
pub use progress::{PassReport, SyncProgress, SyncStats, SyncStatus};
pub use resolver::{AlwaysManual, AlwaysMerge, ClientWins, ConflictResolver, LastWriteWins, ServerWins};
