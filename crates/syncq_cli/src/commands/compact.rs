//! Compact command implementation.

use super::{format_size, open_journal, open_queue};
use std::path::Path;
use syncq_core::journal::scan;
use syncq_core::OperationStatus;

/// Compaction statistics.
#[derive(Debug)]
pub struct CompactStats {
    /// Journal records before.
    pub input_records: usize,
    /// Journal records after (one per live operation).
    pub output_records: usize,
    /// Completed operations pruned.
    pub pruned: usize,
    /// Bytes before compaction.
    pub bytes_before: u64,
    /// Bytes after compaction (unknown on a dry run).
    pub bytes_after: Option<u64>,
}

/// Runs the compact command.
pub fn run(path: &Path, prune_completed: bool, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting queue at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let stats = compact(path, prune_completed, dry_run)?;

    println!("Compaction Analysis:");
    println!("  Input records:  {}", stats.input_records);
    println!("  Output records: {}", stats.output_records);
    println!(
        "  Completed:      {} ({})",
        stats.pruned,
        if prune_completed { "pruned" } else { "kept" }
    );
    println!();
    println!("  Size before: {}", format_size(stats.bytes_before));
    if let Some(after) = stats.bytes_after {
        println!("  Size after:  {}", format_size(after));
        println!(
            "  Space saved: {} ({:.1}%)",
            format_size(stats.bytes_before.saturating_sub(after)),
            if stats.bytes_before > 0 {
                (stats.bytes_before.saturating_sub(after) as f64 / stats.bytes_before as f64) * 100.0
            } else {
                0.0
            }
        );
        println!();
        println!("✓ Compaction complete");
    }

    Ok(())
}

fn compact(path: &Path, prune_completed: bool, dry_run: bool) -> Result<CompactStats, Box<dyn std::error::Error>> {
    let queue = open_queue(path)?;
    let bytes_before = queue.journal_size()?;
    let input_records = scan(&open_journal(path)?)?.records.len();
    let completed = queue.list_by_status(OperationStatus::Completed).len();

    let pruned = if prune_completed { completed } else { 0 };
    let output_records = queue.len() - pruned;

    if dry_run {
        return Ok(CompactStats {
            input_records,
            output_records,
            pruned,
            bytes_before,
            bytes_after: None,
        });
    }

    if prune_completed {
        queue.remove_completed()?;
    }
    queue.compact()?;

    Ok(CompactStats {
        input_records,
        output_records,
        pruned,
        bytes_before,
        bytes_after: Some(queue.journal_size()?),
    })
}
