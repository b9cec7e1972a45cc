//! Dump journal command implementation.

use super::open_journal;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use syncq_core::codec::decode_operation;
use syncq_core::journal::{scan, JournalRecord};

/// Journal record representation for output.
#[derive(Debug, Serialize)]
pub struct JournalRecordInfo {
    /// Offset in the journal file.
    pub offset: u64,
    /// Record type.
    pub record_type: String,
    /// Operation ID (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Operation status after this record (puts only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `METHOD url` (puts only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Retry count (puts only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    /// Encoded operation size in bytes (puts only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_size: Option<usize>,
    /// Decoding problem, if the operation could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}

impl JournalRecordInfo {
    fn describe(offset: u64, record: &JournalRecord) -> Self {
        let mut info = Self {
            offset,
            record_type: record.record_type().as_str().to_uppercase(),
            id: None,
            status: None,
            request: None,
            retry_count: None,
            encoded_size: None,
            decode_error: None,
        };

        match record {
            JournalRecord::Put { operation } => {
                info.encoded_size = Some(operation.len());
                match decode_operation::<Value>(operation) {
                    Ok(op) => {
                        info.id = Some(op.id.to_string());
                        info.status = Some(op.status.to_string());
                        info.request = Some(format!("{} {}", op.method, op.url));
                        info.retry_count = Some(op.retry_count);
                    }
                    Err(e) => info.decode_error = Some(e.to_string()),
                }
            }
            JournalRecord::Remove { id } => info.id = Some(id.to_string()),
            JournalRecord::Clear => {}
        }
        info
    }
}

/// Runs the dump-journal command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_journal(path)?;
    let scanned = scan(&backend)?;
    let records: Vec<JournalRecordInfo> = scanned
        .records
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(offset, record)| JournalRecordInfo::describe(*offset, record))
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records, scanned.records.len(), scanned.torn_bytes);
        }
    }

    Ok(())
}

fn print_text_output(records: &[JournalRecordInfo], total: usize, torn_bytes: u64) {
    println!("Journal Records ({} of {})", records.len(), total);
    println!("================");
    println!();

    for record in records {
        print!("[{:08}] {:6}", record.offset, record.record_type);

        if let Some(ref id) = record.id {
            print!(" id={}", id);
        }
        if let Some(ref status) = record.status {
            print!(" status={}", status);
        }
        if let Some(ref request) = record.request {
            print!(" {}", request);
        }
        if let Some(retries) = record.retry_count {
            print!(" retries={}", retries);
        }
        if let Some(size) = record.encoded_size {
            print!(" size={}", size);
        }
        if let Some(ref err) = record.decode_error {
            print!(" (undecodable: {})", err);
        }

        println!();
    }

    if torn_bytes > 0 {
        println!();
        println!("Torn tail: {} bytes (discarded on next open)", torn_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncq_core::{Method, NewOperation, OperationQueue, JOURNAL_FILE};
    use syncq_storage::FileBackend;

    #[test]
    fn describes_every_record_kind() {
        let dir = tempfile::tempdir().unwrap();
        {
            let queue = OperationQueue::<Value>::open(dir.path()).unwrap();
            let id = queue
                .add(NewOperation::new("doc", Method::Put, "/docs/1", serde_json::json!({})))
                .unwrap();
            queue.remove(&id).unwrap();
            queue.clear().unwrap();
        }

        let backend = FileBackend::open(&dir.path().join(JOURNAL_FILE)).unwrap();
        let scanned = scan(&backend).unwrap();
        let infos: Vec<_> = scanned
            .records
            .iter()
            .map(|(offset, record)| JournalRecordInfo::describe(*offset, record))
            .collect();

        let kinds: Vec<_> = infos.iter().map(|i| i.record_type.as_str()).collect();
        assert_eq!(kinds, ["PUT", "REMOVE", "CLEAR"]);
        assert_eq!(infos[0].request.as_deref(), Some("PUT /docs/1"));
        assert_eq!(infos[0].status.as_deref(), Some("pending"));
        assert_eq!(infos[0].id, infos[1].id);
        assert_eq!(infos[0].offset, 0);
    }

    #[test]
    fn wrong_path_leaves_no_journal_behind() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), None, "text").is_err());
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }
}
