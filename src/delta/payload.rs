//! Full-snapshot payload encoding.

use super::patch::DeltaPatch;
use crate::error::{Result, StoreError};
use crate::types::PayloadEncoding;
use serde_json::Value;

/// An encoded full state with its integrity checksum.
#[derive(Clone, Debug, PartialEq)]
pub struct FullPayload {
    pub encoding: PayloadEncoding,
    pub bytes: Vec<u8>,
    /// CRC32 of `bytes`.
    pub checksum: u32,
}

impl FullPayload {
    /// Stored size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Encode a full state.
pub fn encode_full(state: &Value, encoding: PayloadEncoding) -> Result<FullPayload> {
    let bytes = match encoding {
        PayloadEncoding::Json => serde_json::to_vec(state)?,
        PayloadEncoding::MessagePack => rmp_serde::to_vec(state)?,
    };
    let checksum = crc32fast::hash(&bytes);

    Ok(FullPayload {
        encoding,
        bytes,
        checksum,
    })
}

/// Decode a full state, verifying its checksum first.
pub fn decode_full(payload: &FullPayload) -> Result<Value> {
    let computed = crc32fast::hash(&payload.bytes);
    if computed != payload.checksum {
        return Err(StoreError::ChecksumMismatch {
            expected: payload.checksum,
            got: computed,
        });
    }

    match payload.encoding {
        PayloadEncoding::Json => serde_json::from_slice(&payload.bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string())),
        PayloadEncoding::MessagePack => Ok(rmp_serde::from_slice(&payload.bytes)?),
    }
}

/// Approximate stored size of a patch.
pub fn patch_size(patch: &DeltaPatch) -> Result<usize> {
    Ok(serde_json::to_vec(patch)?.len())
}
