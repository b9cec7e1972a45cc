//! CLI command implementations.

pub mod compact;
pub mod dump_journal;
pub mod edit;
pub mod inspect;
pub mod list;

use serde_json::Value;
use std::path::Path;
use syncq_core::{OperationQueue, QueueConfig, JOURNAL_FILE};
use syncq_storage::FileBackend;

/// Opens an existing queue with JSON payloads.
pub fn open_queue(path: &Path) -> Result<OperationQueue<Value>, Box<dyn std::error::Error>> {
    tracing::debug!("opening queue at {}", path.display());
    let config = QueueConfig::default().create_if_missing(false);
    Ok(OperationQueue::open_with_config(path, config)?)
}

/// Opens the journal file of an existing queue for a read-only scan.
///
/// Refuses a missing file rather than letting the backend create one.
pub fn open_journal(path: &Path) -> Result<FileBackend, Box<dyn std::error::Error>> {
    let journal_path = path.join(JOURNAL_FILE);
    if !journal_path.is_file() {
        return Err(format!("Journal file not found: {}", journal_path.display()).into());
    }
    Ok(FileBackend::open(&journal_path)?)
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
