//! Journal record types and framing.
//!
//! Every record is written in a self-checking frame:
//!
//! ```text
//! | magic "SYNQ" (4) | version u16 (2) | type u8 (1) | length u32 (4) | payload | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The CRC covers everything before it.

use crate::error::{CoreError, CoreResult};
use crate::operation::OperationId;

/// Magic bytes identifying a journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"SYNQ";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing CRC size.
pub const CRC_SIZE: usize = 4;

/// Largest payload a record may carry (16 MiB).
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Type of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Full state of one operation.
    Put = 1,
    /// Removal of one operation.
    Remove = 2,
    /// Removal of every operation.
    Clear = 3,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Remove),
            3 => Some(Self::Clear),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns a short lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Remove => "remove",
            Self::Clear => "clear",
        }
    }
}

/// A journal record.
///
/// `Put` carries the CBOR encoding of the whole operation; the journal itself
/// never looks inside it, so the framing is independent of the payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// Latest state of an operation.
    Put {
        /// CBOR-encoded `Operation<T>`.
        operation: Vec<u8>,
    },
    /// The operation was removed.
    Remove {
        /// Removed operation.
        id: OperationId,
    },
    /// Every operation was removed.
    Clear,
}

impl JournalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Put { .. } => RecordType::Put,
            Self::Remove { .. } => RecordType::Remove,
            Self::Clear => RecordType::Clear,
        }
    }

    /// Encodes the record into a complete frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload exceeds [`MAX_RECORD_SIZE`].
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload: &[u8] = match self {
            Self::Put { operation } => operation,
            Self::Remove { id } => id.as_bytes(),
            Self::Clear => &[],
        };

        let len = u32::try_from(payload.len())
            .ok()
            .filter(|_| payload.len() <= MAX_RECORD_SIZE)
            .ok_or_else(|| {
                CoreError::invalid_operation(format!(
                    "journal record payload of {} bytes exceeds {MAX_RECORD_SIZE}",
                    payload.len()
                ))
            })?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&JOURNAL_MAGIC);
        frame.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        frame.push(self.record_type().as_byte());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(payload);

        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    /// Decodes a record from its type and payload.
    pub fn decode_payload(record_type: RecordType, payload: &[u8]) -> CoreResult<Self> {
        match record_type {
            RecordType::Put => Ok(Self::Put {
                operation: payload.to_vec(),
            }),
            RecordType::Remove => {
                let bytes: [u8; 16] = payload.try_into().map_err(|_| {
                    CoreError::corrupted(format!(
                        "remove record must carry 16 bytes, got {}",
                        payload.len()
                    ))
                })?;
                Ok(Self::Remove {
                    id: OperationId::from_bytes(bytes),
                })
            }
            RecordType::Clear => {
                if !payload.is_empty() {
                    return Err(CoreError::corrupted(format!(
                        "trailing bytes in clear record: {}",
                        payload.len()
                    )));
                }
                Ok(Self::Clear)
            }
        }
    }
}

/// Parsed frame header.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Record type.
    pub record_type: RecordType,
    /// Payload length.
    pub payload_len: usize,
}

impl FrameHeader {
    /// Total frame size including header and CRC.
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len + CRC_SIZE
    }

    /// Parses and validates a frame header found at `offset`.
    ///
    /// # Errors
    ///
    /// Bad magic, a newer version, an unknown type or a length above
    /// [`MAX_RECORD_SIZE`] are corruption.
    pub fn parse(header: &[u8; HEADER_SIZE], offset: u64) -> CoreResult<Self> {
        if header[0..4] != JOURNAL_MAGIC {
            return Err(CoreError::corrupted(format!("invalid magic at offset {offset}")));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > JOURNAL_VERSION {
            return Err(CoreError::corrupted(format!(
                "unsupported version {version} at offset {offset}"
            )));
        }

        let type_byte = header[6];
        let record_type = RecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::corrupted(format!("unknown record type {type_byte} at offset {offset}"))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]);
        let payload_len = usize::try_from(payload_len)
            .ok()
            .filter(|len| *len <= MAX_RECORD_SIZE)
            .ok_or_else(|| {
                CoreError::corrupted(format!(
                    "record length {payload_len} at offset {offset} exceeds {MAX_RECORD_SIZE}"
                ))
            })?;

        Ok(Self {
            record_type,
            payload_len,
        })
    }
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_of(frame: &[u8]) -> [u8; HEADER_SIZE] {
        frame[..HEADER_SIZE].try_into().unwrap()
    }

    #[test]
    fn record_type_bytes() {
        for t in [RecordType::Put, RecordType::Remove, RecordType::Clear] {
            assert_eq!(RecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(RecordType::from_byte(0), None);
        assert_eq!(RecordType::from_byte(9), None);
    }

    #[test]
    fn put_frame_layout() {
        let record = JournalRecord::Put {
            operation: vec![0xCA, 0xFE],
        };
        let frame = record.encode().unwrap();

        assert_eq!(frame.len(), HEADER_SIZE + 2 + CRC_SIZE);
        assert_eq!(&frame[0..4], b"SYNQ");
        assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), JOURNAL_VERSION);
        assert_eq!(frame[6], RecordType::Put.as_byte());
        assert_eq!(&frame[11..13], &[0xCA, 0xFE]);

        let crc = u32::from_le_bytes(frame[13..17].try_into().unwrap());
        assert_eq!(crc, compute_crc32(&frame[..13]));
    }

    #[test]
    fn remove_record_decodes_id() {
        let id = OperationId::new();
        let frame = JournalRecord::Remove { id }.encode().unwrap();
        let header = FrameHeader::parse(&header_of(&frame), 0).unwrap();
        assert_eq!(header.record_type, RecordType::Remove);

        let payload = &frame[HEADER_SIZE..HEADER_SIZE + header.payload_len];
        let decoded = JournalRecord::decode_payload(header.record_type, payload).unwrap();
        assert_eq!(decoded, JournalRecord::Remove { id });
    }

    #[test]
    fn malformed_payloads_are_corruption() {
        assert!(JournalRecord::decode_payload(RecordType::Remove, &[1, 2, 3]).is_err());
        assert!(JournalRecord::decode_payload(RecordType::Clear, &[0]).is_err());
    }

    #[test]
    fn bad_header_fields_are_rejected() {
        let frame = JournalRecord::Clear.encode().unwrap();

        let mut bad_magic = header_of(&frame);
        bad_magic[0] = b'X';
        assert!(FrameHeader::parse(&bad_magic, 0).is_err());

        let mut future_version = header_of(&frame);
        future_version[4] = 0xFF;
        assert!(FrameHeader::parse(&future_version, 0).is_err());

        let mut unknown_type = header_of(&frame);
        unknown_type[6] = 42;
        let err = FrameHeader::parse(&unknown_type, 77).unwrap_err();
        assert!(err.to_string().contains("offset 77"));

        let mut huge = header_of(&frame);
        huge[10] = 0x80;
        assert!(matches!(
            FrameHeader::parse(&huge, 0),
            Err(CoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn oversized_payload_is_refused_on_encode() {
        let record = JournalRecord::Put {
            operation: vec![0; MAX_RECORD_SIZE + 1],
        };
        assert!(matches!(
            record.encode(),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(compute_crc32(&[]), 0);
    }
}
