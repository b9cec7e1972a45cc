//! # syncq core
//!
//! The operation model and the durable queue behind the syncq offline sync
//! engine.
//!
//! An [`Operation`] is one mutation a client wants to apply to a remote
//! system. Operations are added to an [`OperationQueue`], which persists them
//! in an append-only journal and hands them back in dispatch order:
//! priority first, then oldest first.
//!
//! ```rust
//! use syncq_core::{Method, NewOperation, OperationQueue, OperationStatus};
//!
//! let queue = OperationQueue::<String>::open_in_memory().unwrap();
//! let id = queue
//!     .add(NewOperation::new("rental", Method::Post, "/rentals", "payload".into()))
//!     .unwrap();
//!
//! queue.update_status(&id, OperationStatus::Completed).unwrap();
//! assert_eq!(queue.remove_completed().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod dir;
mod error;
pub mod journal;
mod operation;
mod queue;

pub use config::QueueConfig;
pub use dir::{QueueDir, JOURNAL_FILE};
pub use error::{CoreError, CoreResult};
pub use operation::{
    Method, NewOperation, Operation, OperationId, OperationMetadata, OperationStatus, Payload,
    Priority, StatusCounts,
};
pub use queue::OperationQueue;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
