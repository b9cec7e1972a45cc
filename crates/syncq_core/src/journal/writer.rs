//! Journal writer and recovery scan.

use crate::error::{CoreError, CoreResult};
use crate::journal::record::{
    compute_crc32, FrameHeader, JournalRecord, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC,
};
use syncq_storage::StorageBackend;

/// Result of scanning a journal.
#[derive(Debug, Default)]
pub struct Scan {
    /// Valid records with their offsets, in journal order.
    pub records: Vec<(u64, JournalRecord)>,
    /// Length of the valid prefix.
    pub valid_len: u64,
    /// Bytes after the valid prefix belonging to an incomplete record.
    pub torn_bytes: u64,
}

/// Scans every record in `backend` without modifying it.
///
/// # Errors
///
/// - Truncated records (incomplete header or payload) end the scan and are
///   reported in [`Scan::torn_bytes`], provided no intact record follows them
/// - An incomplete record followed by an intact one means a damaged length
///   field, which is corruption
/// - Invalid magic, unknown types, newer versions and lengths above
///   `MAX_RECORD_SIZE` are corruption
/// - CRC mismatches return [`CoreError::ChecksumMismatch`]
pub fn scan(backend: &dyn StorageBackend) -> CoreResult<Scan> {
    let data = backend.read_all()?;
    let total = data.len();
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos < total {
        let offset = pos as u64;
        let Some(header) = data.get(pos..pos + HEADER_SIZE) else {
            break;
        };
        let header: &[u8; HEADER_SIZE] = header
            .try_into()
            .map_err(|_| CoreError::corrupted(format!("short header at offset {offset}")))?;
        let header = FrameHeader::parse(header, offset)?;

        let frame_end = pos
            .checked_add(header.frame_len())
            .ok_or_else(|| CoreError::corrupted(format!("oversized record at offset {offset}")))?;
        if frame_end > total {
            if let Some(next) = next_intact_frame(&data, pos + 1) {
                return Err(CoreError::corrupted(format!(
                    "record at offset {offset} claims {} bytes past the end of the journal, \
                     but an intact record follows at offset {next}",
                    frame_end - total
                )));
            }
            break;
        }

        let body_end = frame_end - CRC_SIZE;
        let expected = u32::from_le_bytes([
            data[body_end],
            data[body_end + 1],
            data[body_end + 2],
            data[body_end + 3],
        ]);
        let actual = compute_crc32(&data[pos..body_end]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        let payload = &data[pos + HEADER_SIZE..body_end];
        records.push((offset, JournalRecord::decode_payload(header.record_type, payload)?));
        pos = frame_end;
    }

    Ok(Scan {
        records,
        valid_len: pos as u64,
        torn_bytes: (total - pos) as u64,
    })
}

/// Finds the first complete, checksum-valid frame starting at or after `from`.
fn next_intact_frame(data: &[u8], from: usize) -> Option<usize> {
    let mut start = from;
    while let Some(found) = data
        .get(start..)?
        .windows(JOURNAL_MAGIC.len())
        .position(|w| w == JOURNAL_MAGIC)
    {
        let pos = start + found;
        if frame_is_intact(data, pos) {
            return Some(pos);
        }
        start = pos + 1;
    }
    None
}

fn frame_is_intact(data: &[u8], pos: usize) -> bool {
    let Some(header) = data
        .get(pos..pos + HEADER_SIZE)
        .and_then(|h| <&[u8; HEADER_SIZE]>::try_from(h).ok())
    else {
        return false;
    };
    let Ok(header) = FrameHeader::parse(header, pos as u64) else {
        return false;
    };
    let body_end = pos + HEADER_SIZE + header.payload_len;
    match data.get(body_end..body_end + CRC_SIZE) {
        Some(crc) => {
            let expected = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
            expected == compute_crc32(&data[pos..body_end])
        }
        None => false,
    }
}

/// Append-only journal over a storage backend.
pub struct Journal {
    backend: Box<dyn StorageBackend>,
    sync_on_write: bool,
    record_count: usize,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("sync_on_write", &self.sync_on_write)
            .field("record_count", &self.record_count)
            .finish_non_exhaustive()
    }
}

impl Journal {
    /// Opens a journal, recovering from a torn tail.
    ///
    /// A trailing incomplete record is the signature of a crash during a
    /// write; it was never acknowledged, so it is truncated away.
    ///
    /// Returns the journal and its valid records in order.
    pub fn open(
        mut backend: Box<dyn StorageBackend>,
        sync_on_write: bool,
    ) -> CoreResult<(Self, Vec<JournalRecord>)> {
        let scan = scan(backend.as_ref())?;

        if scan.torn_bytes > 0 {
            tracing::warn!(
                "discarding {} torn bytes at journal offset {}",
                scan.torn_bytes,
                scan.valid_len
            );
            backend.truncate(scan.valid_len)?;
        }

        let records: Vec<JournalRecord> = scan.records.into_iter().map(|(_, r)| r).collect();
        let journal = Self {
            backend,
            sync_on_write,
            record_count: records.len(),
        };
        Ok((journal, records))
    }

    /// Appends a record. Durable on return when `sync_on_write` is set.
    ///
    /// Returns the offset where the record was written.
    pub fn append(&mut self, record: &JournalRecord) -> CoreResult<u64> {
        let frame = record.encode()?;
        let start = self.backend.size()?;

        let written = self.backend.append(&frame).and_then(|offset| {
            if self.sync_on_write {
                self.backend.sync()?;
            } else {
                self.backend.flush()?;
            }
            Ok(offset)
        });

        match written {
            Ok(offset) => {
                self.record_count += 1;
                Ok(offset)
            }
            Err(e) => {
                if let Err(rollback) = self.backend.truncate(start) {
                    tracing::warn!("failed to roll back partial journal write: {}", rollback);
                }
                Err(e.into())
            }
        }
    }

    /// Atomically replaces the whole journal with `records`.
    pub fn rewrite(&mut self, records: &[JournalRecord]) -> CoreResult<()> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.encode()?);
        }
        self.backend.replace(&data)?;
        self.record_count = records.len();
        Ok(())
    }

    /// Returns the journal size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Number of records currently in the journal.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationId;
    use syncq_storage::InMemoryBackend;

    fn put(bytes: &[u8]) -> JournalRecord {
        JournalRecord::Put {
            operation: bytes.to_vec(),
        }
    }

    #[test]
    fn append_then_reopen() {
        let backend = InMemoryBackend::new();
        let id = OperationId::new();
        {
            let (mut journal, records) = Journal::open(Box::new(backend.clone()), true).unwrap();
            assert!(records.is_empty());
            assert_eq!(journal.append(&put(b"one")).unwrap(), 0);
            journal.append(&JournalRecord::Remove { id }).unwrap();
            journal.append(&JournalRecord::Clear).unwrap();
            assert_eq!(journal.record_count(), 3);
        }

        let (journal, records) = Journal::open(Box::new(backend), true).unwrap();
        assert_eq!(
            records,
            vec![put(b"one"), JournalRecord::Remove { id }, JournalRecord::Clear]
        );
        assert_eq!(journal.record_count(), 3);
    }

    #[test]
    fn torn_payload_is_truncated() {
        let backend = InMemoryBackend::new();
        {
            let (mut journal, _) = Journal::open(Box::new(backend.clone()), true).unwrap();
            journal.append(&put(b"kept")).unwrap();
        }
        let good_len = backend.data().len();

        let torn = put(b"never acknowledged").encode().unwrap();
        let mut raw = backend.data();
        raw.extend_from_slice(&torn[..torn.len() - 3]);
        let backend = InMemoryBackend::with_data(raw);

        let (_, records) = Journal::open(Box::new(backend.clone()), true).unwrap();
        assert_eq!(records, vec![put(b"kept")]);
        assert_eq!(backend.data().len(), good_len);
    }

    #[test]
    fn torn_header_is_truncated() {
        let mut raw = put(b"a").encode().unwrap();
        raw.extend_from_slice(b"SYN");
        let backend = InMemoryBackend::with_data(raw);

        let scanned = scan(&backend).unwrap();
        assert_eq!(scanned.records.len(), 1);
        assert_eq!(scanned.torn_bytes, 3);
    }

    #[test]
    fn crc_mismatch_is_fatal() {
        let mut raw = put(b"first").encode().unwrap();
        let second_at = raw.len();
        raw.extend_from_slice(&put(b"second").encode().unwrap());
        let backend = InMemoryBackend::with_data(raw);
        backend.corrupt_byte(second_at + HEADER_SIZE + 1);

        let err = Journal::open(Box::new(backend), true).unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { offset, .. } if offset == second_at as u64));
    }

    #[test]
    fn damaged_length_is_not_mistaken_for_torn_tail() {
        let backend = InMemoryBackend::new();
        {
            let (mut journal, _) = Journal::open(Box::new(backend.clone()), true).unwrap();
            for payload in [&b"one"[..], b"two", b"three"] {
                journal.append(&put(payload)).unwrap();
            }
        }
        let before = backend.data();

        // High byte of the first record's length field.
        backend.corrupt_byte(HEADER_SIZE - 1);
        assert!(matches!(
            Journal::open(Box::new(backend.clone()), true),
            Err(CoreError::Corrupted { .. })
        ));
        assert_eq!(backend.data().len(), before.len());

        // A small bump past EOF, under the size ceiling.
        let mut raw = before;
        raw[HEADER_SIZE - 4] = 200;
        let backend = InMemoryBackend::with_data(raw.clone());
        let err = Journal::open(Box::new(backend.clone()), true).unwrap_err();
        assert!(matches!(err, CoreError::Corrupted { .. }), "unexpected error: {err}");
        assert_eq!(backend.data(), raw);
    }

    #[test]
    fn bad_magic_is_fatal() {
        let backend = InMemoryBackend::with_data(put(b"x").encode().unwrap());
        backend.corrupt_byte(0);

        assert!(matches!(
            Journal::open(Box::new(backend), true),
            Err(CoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn rewrite_replaces_everything() {
        let backend = InMemoryBackend::new();
        let (mut journal, _) = Journal::open(Box::new(backend.clone()), false).unwrap();
        for i in 0..10u8 {
            journal.append(&put(&[i])).unwrap();
        }
        let before = journal.size().unwrap();

        journal.rewrite(&[put(b"snapshot")]).unwrap();
        assert!(journal.size().unwrap() < before);
        assert_eq!(journal.record_count(), 1);

        let scanned = scan(&backend).unwrap();
        assert_eq!(scanned.records, vec![(0, put(b"snapshot"))]);
    }
}
