//! Core types for the version store.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a stored version, unique within its chain.
///
/// Built from the entity id and the chain's monotonic sequence counter, so
/// ids are never reused even after the history is cleared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub String);

impl VersionId {
    pub fn new(entity_id: &str, sequence: Sequence) -> Self {
        VersionId(format!("{}@{}", entity_id, sequence.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        VersionId(s.to_string())
    }
}

impl From<String> for VersionId {
    fn from(s: String) -> Self {
        VersionId(s)
    }
}

/// Position of a version in its chain's creation order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }
}

/// Content hash of a materialized state (SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Compute hash from bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash(hasher.finalize().into())
    }

    /// Hash the canonical JSON encoding of a state.
    ///
    /// Object keys are kept sorted by `serde_json::Map`, so equal values hash
    /// equally regardless of insertion order.
    pub fn of_state(state: &Value) -> Result<Self> {
        let bytes = serde_json::to_vec(state)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Hash(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Encoding used for full snapshot payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PayloadEncoding {
    #[default]
    Json,
    MessagePack,
}

/// Whether a version stores the whole state or a patch against its base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionKind {
    Full,
    Delta,
}

/// Metadata attached to every version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Approximate stored payload size.
    pub size_bytes: usize,

    /// Wall time spent building the record.
    pub snapshot_duration_ms: f64,

    /// Set when the input graph had cycles and back-edges were dropped.
    #[serde(default)]
    pub cyclic_truncated: bool,

    /// Host-supplied fields.
    #[serde(default)]
    pub custom: BTreeMap<String, Value>,
}

/// Read-only view of a version, without its payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub version_id: VersionId,
    pub entity_id: String,
    pub sequence: Sequence,
    pub timestamp: Timestamp,
    pub kind: VersionKind,
    pub base_version_id: Option<VersionId>,
    pub state_hash: Hash,
    pub metadata: SnapshotMetadata,
    /// True for the version the store currently diffs against.
    pub is_current: bool,
}
