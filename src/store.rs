//! Version chain store: the host-facing API for one entity.

use crate::chain::{RecordPayload, VersionChain, VersionRecord};
use crate::changeset::{ChangeSet, ChangeSetFormatter};
use crate::convergence::{ConvergenceConfig, ConvergenceEstimator, HistoryEntry};
use crate::delta::{diff, encode_full, Projection, SnapshotSource};
use crate::error::{Result, StoreError};
use crate::stats::{PerformanceStats, PerformanceTracker};
use crate::subscriptions::{ChainEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionManager};
use crate::types::{
    Hash, PayloadEncoding, SnapshotMetadata, Timestamp, VersionDescriptor, VersionId, VersionKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Store configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreConfig {
    /// Maximum number of retained versions.
    pub max_versions: usize,

    /// Number of timing samples kept for performance stats.
    pub performance_sample_window: usize,

    /// Store a full snapshot instead of a delta once the head is this many
    /// deltas away from its nearest full snapshot. `None` stores deltas only.
    pub full_snapshot_every: Option<usize>,

    /// Materialized states kept in memory (LRU).
    pub cache_capacity: usize,

    /// Encoding for full snapshot payloads.
    pub encoding: PayloadEncoding,

    /// Constants for convergence metrics in exported history.
    pub convergence: ConvergenceConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_versions: 10,
            performance_sample_window: 100,
            full_snapshot_every: None,
            cache_capacity: 16,
            encoding: PayloadEncoding::Json,
            convergence: ConvergenceConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions = max_versions;
        self
    }

    pub fn with_full_snapshot_every(mut self, every: usize) -> Self {
        self.full_snapshot_every = Some(every);
        self
    }

    pub fn with_encoding(mut self, encoding: PayloadEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_versions == 0 {
            return Err(StoreError::InvalidConfig(
                "max_versions must be at least 1".to_string(),
            ));
        }
        if self.performance_sample_window == 0 {
            return Err(StoreError::InvalidConfig(
                "performance_sample_window must be at least 1".to_string(),
            ));
        }
        if self.full_snapshot_every == Some(0) {
            return Err(StoreError::InvalidConfig(
                "full_snapshot_every must be at least 1".to_string(),
            ));
        }
        self.convergence.validate()
    }
}

/// Result of a pruning pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneOutcome {
    pub removed_count: usize,
    pub remaining: usize,
}

/// Everything a host needs to persist or inspect a chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedHistory {
    pub entity_id: String,
    pub descriptors: Vec<VersionDescriptor>,
    pub history: Vec<HistoryEntry>,
    pub performance: PerformanceStats,
}

impl ExportedHistory {
    /// Write as pretty-printed JSON.
    pub fn to_writer(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Versioned state store for a single entity.
///
/// Snapshots are stored as one full record followed by deltas against the
/// head at the time each snapshot was taken. Retention is bounded by
/// `max_versions`; eviction never leaves a version unreconstructible.
///
/// All calls take `&mut self`: a store has exactly one logical owner. Share
/// it across threads through [`crate::StoreRegistry`] or your own lock.
pub struct VersionChainStore {
    config: StoreConfig,

    chain: VersionChain,

    performance: PerformanceTracker,

    subscriptions: SubscriptionManager,
}

impl VersionChainStore {
    /// Create an empty store for `entity_id`.
    pub fn new(entity_id: impl Into<String>, config: StoreConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            chain: VersionChain::new(entity_id, config.cache_capacity, config.encoding),
            performance: PerformanceTracker::new(config.performance_sample_window),
            subscriptions: SubscriptionManager::new(),
            config,
        })
    }

    pub fn entity_id(&self) -> &str {
        self.chain.entity_id()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    // --- Snapshots ---

    /// Store a new version of the entity's state and make it current.
    ///
    /// The first version is stored in full; later ones as a delta against
    /// the current head. Pruning runs afterwards. If anything fails, the
    /// chain is left exactly as it was.
    pub fn create_snapshot<S>(
        &mut self,
        state: &S,
        custom: Option<BTreeMap<String, Value>>,
    ) -> Result<VersionId>
    where
        S: SnapshotSource + ?Sized,
    {
        let started = Instant::now();

        let Projection {
            state,
            cyclic_truncated,
        } = state.project();
        if cyclic_truncated {
            warn!(
                entity_id = %self.entity_id(),
                "snapshot input contained reference cycles; back-edges dropped"
            );
        }

        let state_hash = Hash::of_state(&state)?;
        let sequence = self.chain.next_sequence();
        let version_id = VersionId::new(self.entity_id(), sequence);

        let (payload, base_version_id) = match self.chain.head_index() {
            Some(head) if !self.full_snapshot_due(head)? => {
                let base_state = self.chain.materialize(head)?;
                let base_id = self.chain.at(head).map(|r| r.version_id.clone());
                (RecordPayload::Delta(diff(&base_state, &state)), base_id)
            }
            _ => (
                RecordPayload::Full(encode_full(&state, self.config.encoding)?),
                None,
            ),
        };

        let metadata = SnapshotMetadata {
            size_bytes: payload.size_bytes()?,
            snapshot_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            cyclic_truncated,
            custom: custom.unwrap_or_default(),
        };

        let record = VersionRecord {
            version_id: version_id.clone(),
            entity_id: self.entity_id().to_string(),
            sequence,
            timestamp: Timestamp::now(),
            payload,
            base_version_id,
            state_hash,
            metadata: metadata.clone(),
        };

        debug!(
            entity_id = %self.entity_id(),
            version_id = %version_id,
            kind = ?record.kind(),
            size_bytes = metadata.size_bytes,
            "created snapshot"
        );

        let previous_head = self.chain.head_index();
        self.chain.push(record, state);

        let pruned = match self.chain.prune_to(self.config.max_versions) {
            Ok(removed) => removed,
            Err(e) => {
                self.chain.rollback_last(previous_head);
                return Err(e);
            }
        };

        self.performance
            .record_snapshot(started.elapsed().as_secs_f64() * 1000.0);

        self.subscriptions.broadcast(ChainEvent::SnapshotCreated {
            entity_id: self.entity_id().to_string(),
            version_id: version_id.clone(),
            metadata,
        });
        self.announce_pruned(pruned);

        Ok(version_id)
    }

    /// Reconstruct a version and make it the head.
    ///
    /// Subsequent snapshots diff against the restored state but are still
    /// appended after the newest version; history is never truncated.
    pub fn restore_version(&mut self, version_id: &VersionId) -> Result<Value> {
        let started = Instant::now();

        let index = self
            .chain
            .position(version_id)
            .ok_or_else(|| StoreError::VersionNotFound(version_id.clone()))?;

        let state = self.chain.materialize(index)?;
        self.chain.set_head(index);

        self.performance
            .record_restore(started.elapsed().as_secs_f64() * 1000.0);
        debug!(entity_id = %self.entity_id(), version_id = %version_id, "restored version");

        Ok(state)
    }

    /// Diff two stored versions. Does not move the head.
    pub fn compare_versions(&mut self, from: &VersionId, to: &VersionId) -> Result<ChangeSet> {
        let from_index = self
            .chain
            .position(from)
            .ok_or_else(|| StoreError::VersionNotFound(from.clone()))?;
        let to_index = self
            .chain
            .position(to)
            .ok_or_else(|| StoreError::VersionNotFound(to.clone()))?;

        let from_state = self.chain.materialize(from_index)?;
        let to_state = self.chain.materialize(to_index)?;
        let patch = diff(&from_state, &to_state);

        let from_descriptor = self.descriptor_at(from_index)?;
        let to_descriptor = self.descriptor_at(to_index)?;

        Ok(ChangeSetFormatter::format(
            &patch,
            &from_descriptor,
            &to_descriptor,
            &from_state,
        ))
    }

    // --- Inspection ---

    pub fn get_version(&self, version_id: &VersionId) -> Option<VersionDescriptor> {
        let index = self.chain.position(version_id)?;
        self.descriptor_at(index).ok()
    }

    /// All retained versions, oldest first.
    pub fn list_versions(&self) -> Vec<VersionDescriptor> {
        let head = self.chain.head_index();
        self.chain
            .records()
            .enumerate()
            .map(|(i, r)| r.descriptor(head == Some(i)))
            .collect()
    }

    /// Kinds of all retained versions, oldest first.
    pub fn kinds(&self) -> Vec<VersionKind> {
        self.chain.records().map(|r| r.kind()).collect()
    }

    pub fn current_version(&self) -> Option<VersionDescriptor> {
        self.chain.head().map(|r| r.descriptor(true))
    }

    /// Materialized state of the head, if any version exists.
    pub fn current_state(&mut self) -> Result<Option<Value>> {
        match self.chain.head_index() {
            Some(head) => self.chain.materialize(head).map(Some),
            None => Ok(None),
        }
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let storage_bytes = self.chain.records().map(|r| r.metadata.size_bytes).sum();
        let full_count = self.chain.full_count();
        self.performance
            .summary(storage_bytes, full_count, self.chain.len() - full_count)
    }

    // --- Retention ---

    /// Evict the oldest versions beyond `max_versions`.
    ///
    /// Runs automatically after every snapshot.
    pub fn prune_to_limit(&mut self) -> Result<PruneOutcome> {
        let removed = self.chain.prune_to(self.config.max_versions)?;
        self.announce_pruned(removed);

        Ok(PruneOutcome {
            removed_count: removed,
            remaining: self.chain.len(),
        })
    }

    /// Drop every version. Sequence numbers keep counting.
    pub fn clear_history(&mut self) {
        let removed = self.chain.clear();
        self.performance.reset();
        info!(entity_id = %self.entity_id(), removed, "cleared history");

        self.subscriptions.broadcast(ChainEvent::HistoryCleared {
            entity_id: self.entity_id().to_string(),
            removed_count: removed,
        });
    }

    /// Descriptors, pairwise history and performance figures.
    pub fn export_history(&mut self) -> Result<ExportedHistory> {
        let estimator = ConvergenceEstimator::new(self.config.convergence.clone());
        let history = estimator.history(self)?;

        Ok(ExportedHistory {
            entity_id: self.entity_id().to_string(),
            descriptors: self.list_versions(),
            history,
            performance: self.performance_stats(),
        })
    }

    // --- Events ---

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    // --- Internal ---

    fn full_snapshot_due(&self, head: usize) -> Result<bool> {
        match self.config.full_snapshot_every {
            Some(every) => Ok(self.chain.delta_depth(head)? + 1 >= every),
            None => Ok(false),
        }
    }

    fn descriptor_at(&self, index: usize) -> Result<VersionDescriptor> {
        let is_current = self.chain.head_index() == Some(index);
        self.chain
            .at(index)
            .map(|r| r.descriptor(is_current))
            .ok_or_else(|| StoreError::CorruptChain(format!("no record at index {}", index)))
    }

    fn announce_pruned(&self, removed: usize) {
        if removed == 0 {
            return;
        }

        info!(
            entity_id = %self.entity_id(),
            removed,
            remaining = self.chain.len(),
            "pruned versions"
        );
        self.subscriptions.broadcast(ChainEvent::VersionsPruned {
            entity_id: self.entity_id().to_string(),
            removed_count: removed,
            remaining: self.chain.len(),
        });
    }

    #[cfg(test)]
    pub(crate) fn chain_mut(&mut self) -> &mut VersionChain {
        &mut self.chain
    }
}
