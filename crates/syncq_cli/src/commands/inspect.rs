//! Inspect command implementation.

use super::{format_size, open_journal, open_queue};
use serde::Serialize;
use std::path::Path;
use syncq_core::journal::scan;
use syncq_core::StatusCounts;

/// Queue inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Queue directory.
    pub path: String,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Records in the journal.
    pub journal_records: usize,
    /// Live operations.
    pub operations: usize,
    /// Operations per status.
    pub counts: StatusCounts,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    // Opening recovers the journal, so the scan below sees a clean file.
    let queue = open_queue(path)?;
    let counts = queue.count_by_status();
    let journal_size = queue.journal_size()?;

    let backend = open_journal(path)?;
    let journal_records = scan(&backend)?.records.len();

    Ok(InspectResult {
        path: path.display().to_string(),
        journal_size,
        journal_records,
        operations: counts.total(),
        counts,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("syncq Queue Inspection");
    println!("======================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Journal:");
    println!("  Size:    {}", format_size(result.journal_size));
    println!("  Records: {}", result.journal_records);
    println!();
    println!("Operations: {}", result.operations);
    println!("  Pending:   {}", result.counts.pending);
    println!("  Syncing:   {}", result.counts.syncing);
    println!("  Completed: {}", result.counts.completed);
    println!("  Failed:    {}", result.counts.failed);
    println!("  Conflict:  {}", result.counts.conflict);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use syncq_core::{Method, NewOperation, OperationQueue};

    #[test]
    fn counts_reflect_journal() {
        let dir = tempfile::tempdir().unwrap();
        {
            let queue = OperationQueue::<Value>::open(dir.path()).unwrap();
            let a = queue
                .add(NewOperation::new("doc", Method::Post, "/docs", json!({})))
                .unwrap();
            queue
                .add(NewOperation::new("doc", Method::Post, "/docs", json!({})))
                .unwrap();
            queue.set_failed(&a, "rejected").unwrap();
        }

        let result = inspect(dir.path()).unwrap();
        assert_eq!(result.operations, 2);
        assert_eq!(result.counts.pending, 1);
        assert_eq!(result.counts.failed, 1);
        assert_eq!(result.journal_records, 3);
        assert!(result.journal_size > 0);
    }
}
