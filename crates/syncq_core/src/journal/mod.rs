//! Append-only journal backing the queue.
//!
//! Each queue mutation appends exactly one framed record, so every state
//! transition is atomic per record. Replaying the records in order rebuilds
//! the queue.

mod record;
mod writer;

pub use record::{
    compute_crc32, FrameHeader, JournalRecord, RecordType, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC,
    JOURNAL_VERSION, MAX_RECORD_SIZE,
};
pub use writer::{scan, Journal, Scan};
