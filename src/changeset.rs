//! Presentation-ready change sets.

use crate::delta::{value_at, DeltaPatch, Path};
use crate::types::{Timestamp, VersionDescriptor, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Why an entry is in a change set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeReason {
    #[serde(rename = "Property added")]
    Added,
    #[serde(rename = "Property modified")]
    Modified,
    #[serde(rename = "Property deleted")]
    Deleted,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChangeReason::Added => "Property added",
            ChangeReason::Modified => "Property modified",
            ChangeReason::Deleted => "Property deleted",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdditionEntry {
    pub path: Path,
    pub value: Value,
    pub reason: ChangeReason,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModificationEntry {
    pub path: Path,
    pub old_value: Value,
    pub new_value: Value,
    pub reason: ChangeReason,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletionEntry {
    pub path: Path,
    /// The value the path held in the "from" version.
    pub old_value: Value,
    pub reason: ChangeReason,
}

/// The differences between two stored versions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub from_version_id: VersionId,
    pub to_version_id: VersionId,
    pub from_timestamp: Timestamp,
    pub to_timestamp: Timestamp,
    pub additions: Vec<AdditionEntry>,
    pub modifications: Vec<ModificationEntry>,
    pub deletions: Vec<DeletionEntry>,
    pub total_changes: usize,
    /// e.g. "3 changes: 1 additions, 2 modifications, 0 deletions"
    pub summary: String,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.total_changes == 0
    }
}

/// Turns raw patches into [`ChangeSet`]s.
pub struct ChangeSetFormatter;

impl ChangeSetFormatter {
    /// Format `patch`, the diff from `from` to `to`.
    ///
    /// `from_state` is the materialized "from" version; deletions take their
    /// `old_value` from it.
    pub fn format(
        patch: &DeltaPatch,
        from: &VersionDescriptor,
        to: &VersionDescriptor,
        from_state: &Value,
    ) -> ChangeSet {
        let additions: Vec<AdditionEntry> = patch
            .additions
            .iter()
            .map(|a| AdditionEntry {
                path: a.path.clone(),
                value: a.value.clone(),
                reason: ChangeReason::Added,
            })
            .collect();

        let modifications: Vec<ModificationEntry> = patch
            .modifications
            .iter()
            .map(|m| ModificationEntry {
                path: m.path.clone(),
                old_value: m.old_value.clone(),
                new_value: m.new_value.clone(),
                reason: ChangeReason::Modified,
            })
            .collect();

        let deletions: Vec<DeletionEntry> = patch
            .deletions
            .iter()
            .map(|path| DeletionEntry {
                path: path.clone(),
                old_value: value_at(from_state, path).cloned().unwrap_or(Value::Null),
                reason: ChangeReason::Deleted,
            })
            .collect();

        let total_changes = additions.len() + modifications.len() + deletions.len();
        let summary = format!(
            "{} changes: {} additions, {} modifications, {} deletions",
            total_changes,
            additions.len(),
            modifications.len(),
            deletions.len()
        );

        ChangeSet {
            from_version_id: from.version_id.clone(),
            to_version_id: to.version_id.clone(),
            from_timestamp: from.timestamp,
            to_timestamp: to.timestamp,
            additions,
            modifications,
            deletions,
            total_changes,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::diff;
    use crate::types::{Hash, Sequence, SnapshotMetadata, VersionKind};
    use serde_json::json;

    fn descriptor(seq: u64) -> VersionDescriptor {
        VersionDescriptor {
            version_id: VersionId::new("doc", Sequence(seq)),
            entity_id: "doc".to_string(),
            sequence: Sequence(seq),
            timestamp: Timestamp(seq as i64 * 1000),
            kind: VersionKind::Full,
            base_version_id: None,
            state_hash: Hash::from_bytes(b""),
            metadata: SnapshotMetadata::default(),
            is_current: false,
        }
    }

    #[test]
    fn test_summary_and_reasons() {
        let from = json!({"a": 1, "b": 2, "c": {"d": 3}});
        let to = json!({"a": 10, "c": {"d": 3}, "e": true});
        let change_set = ChangeSetFormatter::format(&diff(&from, &to), &descriptor(1), &descriptor(2), &from);

        assert_eq!(change_set.total_changes, 3);
        assert_eq!(
            change_set.summary,
            "3 changes: 1 additions, 1 modifications, 1 deletions"
        );
        assert_eq!(change_set.additions[0].reason, ChangeReason::Added);
        assert_eq!(change_set.modifications[0].reason.to_string(), "Property modified");
        assert_eq!(change_set.from_timestamp, Timestamp(1000));
        assert_eq!(change_set.to_version_id, VersionId::from("doc@2"));
    }

    #[test]
    fn test_deletion_old_value_resolved_from_source() {
        let from = json!({"keep": 1, "gone": {"nested": [1, 2]}, "list": ["x", "y"]});
        let to = json!({"keep": 1, "list": ["x"]});
        let change_set = ChangeSetFormatter::format(&diff(&from, &to), &descriptor(1), &descriptor(2), &from);

        assert_eq!(change_set.deletions.len(), 2);
        let gone = change_set
            .deletions
            .iter()
            .find(|d| d.path.to_string() == "gone")
            .unwrap();
        assert_eq!(gone.old_value, json!({"nested": [1, 2]}));
        let trailing = change_set
            .deletions
            .iter()
            .find(|d| d.path.to_string() == "list[1]")
            .unwrap();
        assert_eq!(trailing.old_value, json!("y"));
    }

    #[test]
    fn test_reason_serializes_as_text() {
        assert_eq!(
            serde_json::to_value(ChangeReason::Deleted).unwrap(),
            json!("Property deleted")
        );
    }
}
