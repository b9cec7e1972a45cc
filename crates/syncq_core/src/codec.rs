//! CBOR encoding of operations for the journal.

use crate::error::{CoreError, CoreResult};
use crate::operation::Operation;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes an operation as CBOR.
pub fn encode_operation<T: Serialize>(operation: &Operation<T>) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(operation, &mut buf)
        .map_err(|e| CoreError::codec(format!("encode {}: {e}", operation.id)))?;
    Ok(buf)
}

/// Decodes an operation from CBOR.
pub fn decode_operation<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<Operation<T>> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::codec(format!("decode operation: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Method, NewOperation, OperationMetadata, Priority};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn json_payload_survives_cbor() {
        let new = NewOperation::new("note", Method::Patch, "/notes/1", json!({"title": "hi", "n": 3}))
            .with_priority(Priority::Critical)
            .with_metadata(
                OperationMetadata::for_entity("note", "1")
                    .with_client_version(Utc::now())
                    .with_tenant("acme"),
            );
        let op = Operation::from_new(new, 1, Utc::now());

        let bytes = encode_operation(&op).unwrap();
        let decoded: Operation<serde_json::Value> = decode_operation(&bytes).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let result = decode_operation::<String>(&[0xFF, 0x00, 0x13]);
        assert!(matches!(result, Err(CoreError::Codec { .. })));
    }
}
