//! List command implementation.

use super::open_queue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use syncq_core::{Operation, OperationQueue, OperationStatus};

/// One operation, flattened for output.
#[derive(Debug, Serialize)]
pub struct OperationInfo {
    /// Operation ID.
    pub id: String,
    /// Status.
    pub status: OperationStatus,
    /// Priority.
    pub priority: String,
    /// Operation type.
    pub op_type: String,
    /// `METHOD url`.
    pub request: String,
    /// Retries used / allowed.
    pub retries: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Earliest next attempt, if backing off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    /// Last error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payload.
    pub payload: Value,
    /// Server payload for parked conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_data: Option<Value>,
}

impl From<Operation<Value>> for OperationInfo {
    fn from(op: Operation<Value>) -> Self {
        Self {
            id: op.id.to_string(),
            status: op.status,
            priority: op.priority.to_string(),
            request: format!("{} {}", op.method, op.url),
            op_type: op.op_type,
            retries: format!("{}/{}", op.retry_count, op.max_retries),
            created_at: op.created_at,
            not_before: op.not_before,
            error: op.error_message,
            payload: op.payload,
            conflict_data: op.conflict_data,
        }
    }
}

/// Runs the list command.
pub fn run(
    path: &Path,
    status: Option<OperationStatus>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let queue = open_queue(path)?;
    let operations = select(&queue, status, limit);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&operations)?);
        }
        _ => {
            print_text_output(&operations);
        }
    }

    Ok(())
}

/// Pending operations in dispatch order, then everything else by sequence.
fn select(
    queue: &OperationQueue<Value>,
    status: Option<OperationStatus>,
    limit: Option<usize>,
) -> Vec<OperationInfo> {
    let operations = match status {
        Some(OperationStatus::Pending) => queue.get_pending(),
        Some(other) => queue.list_by_status(other),
        None => {
            let mut all = queue.get_pending();
            all.extend(
                queue
                    .get_all()
                    .into_iter()
                    .filter(|op| op.status != OperationStatus::Pending),
            );
            all
        }
    };

    operations
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(OperationInfo::from)
        .collect()
}

fn print_text_output(operations: &[OperationInfo]) {
    println!("Operations ({})", operations.len());
    println!("================");
    println!();

    for op in operations {
        print!(
            "{} {:9} {:8} {} [{}] retries={}",
            op.id,
            op.status.as_str(),
            op.priority,
            op.request,
            op.op_type,
            op.retries
        );
        if let Some(not_before) = op.not_before {
            print!(" after={}", not_before.to_rfc3339());
        }
        if let Some(ref error) = op.error {
            print!(" error={:?}", error);
        }
        println!();
    }
}
