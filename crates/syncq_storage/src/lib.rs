//! # syncq storage
//!
//! Byte-store backends underneath the syncq operation journal.
//!
//! Backends are **opaque**: they append, read back and atomically replace
//! bytes. They know nothing about journal frames, operations or queues;
//! `syncq_core` owns all format interpretation.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - tests and ephemeral queues
//! - [`FileBackend`] - persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use syncq_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//!
//! backend.replace(b"snapshot").unwrap();
//! assert_eq!(backend.size().unwrap(), 8);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
