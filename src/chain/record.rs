//! Version records.

use crate::delta::{patch_size, DeltaPatch, FullPayload};
use crate::error::Result;
use crate::types::{
    Hash, Sequence, SnapshotMetadata, Timestamp, VersionDescriptor, VersionId, VersionKind,
};

/// What a record stores.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordPayload {
    /// The complete encoded state.
    Full(FullPayload),
    /// A patch against the record's base version.
    Delta(DeltaPatch),
}

impl RecordPayload {
    pub fn kind(&self) -> VersionKind {
        match self {
            RecordPayload::Full(_) => VersionKind::Full,
            RecordPayload::Delta(_) => VersionKind::Delta,
        }
    }

    /// Approximate stored size in bytes.
    pub fn size_bytes(&self) -> Result<usize> {
        match self {
            RecordPayload::Full(payload) => Ok(payload.size_bytes()),
            RecordPayload::Delta(patch) => patch_size(patch),
        }
    }
}

/// A single stored version.
#[derive(Clone, Debug)]
pub struct VersionRecord {
    /// Unique identifier within the chain.
    pub version_id: VersionId,

    /// Entity the chain belongs to.
    pub entity_id: String,

    /// Creation order, strictly increasing.
    pub sequence: Sequence,

    /// When the snapshot was taken.
    pub timestamp: Timestamp,

    pub payload: RecordPayload,

    /// Version the delta applies to. Always `None` for full records.
    pub base_version_id: Option<VersionId>,

    /// Hash of the materialized state, checked on reconstruction.
    pub state_hash: Hash,

    pub metadata: SnapshotMetadata,
}

impl VersionRecord {
    pub fn kind(&self) -> VersionKind {
        self.payload.kind()
    }

    pub fn is_full(&self) -> bool {
        matches!(self.payload, RecordPayload::Full(_))
    }

    /// Payload-free view of this record.
    pub fn descriptor(&self, is_current: bool) -> VersionDescriptor {
        VersionDescriptor {
            version_id: self.version_id.clone(),
            entity_id: self.entity_id.clone(),
            sequence: self.sequence,
            timestamp: self.timestamp,
            kind: self.kind(),
            base_version_id: self.base_version_id.clone(),
            state_hash: self.state_hash,
            metadata: self.metadata.clone(),
            is_current,
        }
    }

    /// Turn this record into a full snapshot of its own state.
    pub(crate) fn rebase(&mut self, payload: FullPayload) {
        self.metadata.size_bytes = payload.size_bytes();
        self.payload = RecordPayload::Full(payload);
        self.base_version_id = None;
    }
}
