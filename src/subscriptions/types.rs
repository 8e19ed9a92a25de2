//! Subscription types for chain events.

use crate::types::{SnapshotMetadata, VersionId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Events buffered before the subscriber counts as slow and is dropped.
    pub buffer_size: usize,

    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Which event kinds a subscriber wants. `Dropped` notices always pass.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Include `SnapshotCreated` events.
    pub include_snapshots: bool,

    /// Include `VersionsPruned` events.
    pub include_pruning: bool,

    /// Include `HistoryCleared` events.
    pub include_clears: bool,
}

impl SubscriptionFilter {
    /// Subscribe to new snapshots only.
    pub fn snapshots() -> Self {
        Self {
            include_snapshots: true,
            ..Default::default()
        }
    }

    /// Subscribe to retention events (pruning and clears).
    pub fn retention() -> Self {
        Self {
            include_pruning: true,
            include_clears: true,
            ..Default::default()
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            include_snapshots: true,
            include_pruning: true,
            include_clears: true,
        }
    }

    pub(crate) fn matches(&self, event: &ChainEvent) -> bool {
        match event {
            ChainEvent::SnapshotCreated { .. } => self.include_snapshots,
            ChainEvent::VersionsPruned { .. } => self.include_pruning,
            ChainEvent::HistoryCleared { .. } => self.include_clears,
            ChainEvent::Dropped { .. } => true,
        }
    }
}

/// Events emitted by a version chain store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainEvent {
    /// A version was appended.
    SnapshotCreated {
        entity_id: String,
        version_id: VersionId,
        metadata: SnapshotMetadata,
    },

    /// Old versions were evicted to respect the retention limit.
    VersionsPruned {
        entity_id: String,
        removed_count: usize,
        remaining: usize,
    },

    /// Every version was discarded.
    HistoryCleared {
        entity_id: String,
        removed_count: usize,
    },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

impl ChainEvent {
    /// Wire name of the event, as used in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainEvent::SnapshotCreated { .. } => "snapshot_created",
            ChainEvent::VersionsPruned { .. } => "versions_pruned",
            ChainEvent::HistoryCleared { .. } => "history_cleared",
            ChainEvent::Dropped { .. } => "dropped",
        }
    }

    /// Entity the event concerns. `None` for subscription notices.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            ChainEvent::SnapshotCreated { entity_id, .. }
            | ChainEvent::VersionsPruned { entity_id, .. }
            | ChainEvent::HistoryCleared { entity_id, .. } => Some(entity_id),
            ChainEvent::Dropped { .. } => None,
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of a subscription. Dropping it unsubscribes on the next
/// broadcast.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub receiver: crossbeam_channel::Receiver<ChainEvent>,
}

impl SubscriptionHandle {
    pub fn recv(&self) -> Result<ChainEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<ChainEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ChainEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<ChainEvent> {
        self.receiver.try_iter().collect()
    }
}
