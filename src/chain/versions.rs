//! Ordered version chain for one entity.

use super::record::{RecordPayload, VersionRecord};
use crate::delta::{apply, decode_full, encode_full};
use crate::error::{Result, StoreError};
use crate::types::{Hash, PayloadEncoding, Sequence, VersionId};
use lru::LruCache;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use tracing::debug;

/// The records of one entity in creation order, plus the head pointer.
///
/// Invariants maintained here:
/// - the oldest record is always a full snapshot
/// - every delta's base is still present and older than the delta
/// - sequences strictly increase and are never handed out twice
pub struct VersionChain {
    entity_id: String,

    /// Records ordered by sequence.
    records: VecDeque<VersionRecord>,

    /// Version ID to sequence, for binary search into `records`.
    sequences: HashMap<VersionId, Sequence>,

    /// Index of the current version in `records`.
    head: Option<usize>,

    /// Next sequence to assign.
    next_sequence: Sequence,

    /// Recently materialized states.
    cache: LruCache<VersionId, Value>,

    /// Encoding for full payloads produced by rebasing.
    encoding: PayloadEncoding,
}

impl VersionChain {
    pub fn new(entity_id: impl Into<String>, cache_capacity: usize, encoding: PayloadEncoding) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            entity_id: entity_id.into(),
            records: VecDeque::new(),
            sequences: HashMap::new(),
            head: None,
            next_sequence: Sequence(1),
            cache: LruCache::new(capacity),
            encoding,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &VersionRecord> {
        self.records.iter()
    }

    pub fn full_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_full()).count()
    }

    /// The sequence the next pushed record will carry.
    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    pub fn head_index(&self) -> Option<usize> {
        self.head
    }

    pub fn head(&self) -> Option<&VersionRecord> {
        self.head.and_then(|i| self.records.get(i))
    }

    pub fn set_head(&mut self, index: usize) {
        if index < self.records.len() {
            self.head = Some(index);
        }
    }

    pub fn position(&self, id: &VersionId) -> Option<usize> {
        let sequence = self.sequences.get(id)?;
        self.records
            .binary_search_by_key(sequence, |r| r.sequence)
            .ok()
    }

    pub fn get(&self, id: &VersionId) -> Option<&VersionRecord> {
        self.position(id).and_then(|i| self.records.get(i))
    }

    pub fn at(&self, index: usize) -> Option<&VersionRecord> {
        self.records.get(index)
    }

    /// Append a record and make it the head.
    ///
    /// `state` is the record's materialized value, cached so the next
    /// snapshot can diff against it without a chain walk.
    pub fn push(&mut self, record: VersionRecord, state: Value) {
        self.next_sequence = record.sequence.next();
        self.sequences.insert(record.version_id.clone(), record.sequence);
        self.cache.put(record.version_id.clone(), state);
        self.records.push_back(record);
        self.head = Some(self.records.len() - 1);
    }

    /// Undo the most recent `push`, restoring the previous head.
    ///
    /// The sequence counter is not rewound.
    pub fn rollback_last(&mut self, previous_head: Option<usize>) {
        if let Some(record) = self.records.pop_back() {
            self.sequences.remove(&record.version_id);
            self.cache.pop(&record.version_id);
        }
        self.head = previous_head.filter(|&i| i < self.records.len());
    }

    /// Number of deltas between the record at `index` and its nearest full
    /// ancestor.
    pub fn delta_depth(&self, index: usize) -> Result<usize> {
        let mut depth = 0;
        let mut cursor = index;
        loop {
            let record = self.record_at(cursor)?;
            if record.is_full() {
                return Ok(depth);
            }
            cursor = self.base_position(cursor)?;
            depth += 1;
        }
    }

    /// Reconstruct the state of the record at `index`.
    ///
    /// Walks base links back to the nearest full snapshot (or cached state),
    /// then applies each delta forward. The result must hash to the record's
    /// `state_hash`; on any failure nothing partial is returned.
    pub fn materialize(&mut self, index: usize) -> Result<Value> {
        let target = self.record_at(index)?;
        let target_id = target.version_id.clone();
        let expected = target.state_hash;

        if let Some(state) = self.cache.get(&target_id) {
            return Ok(state.clone());
        }

        let mut pending = Vec::new();
        let mut cursor = index;
        let mut state = loop {
            let record = self.record_at(cursor)?;
            if cursor != index {
                if let Some(state) = self.cache.peek(&record.version_id) {
                    break state.clone();
                }
            }
            match &record.payload {
                RecordPayload::Full(payload) => break decode_full(payload)?,
                RecordPayload::Delta(_) => {
                    pending.push(cursor);
                    cursor = self.base_position(cursor)?;
                }
            }
        };

        for &i in pending.iter().rev() {
            if let RecordPayload::Delta(patch) = &self.records[i].payload {
                state = apply(&state, patch)?;
            }
        }

        let got = Hash::of_state(&state)?;
        if got != expected {
            return Err(StoreError::HashMismatch { expected, got });
        }

        self.cache.put(target_id, state.clone());
        Ok(state)
    }

    /// Evict the oldest records until at most `max` remain.
    ///
    /// Any delta based on the record being evicted is first rebased into a
    /// full snapshot. Rebased payloads are computed before anything is
    /// mutated, so a failed eviction step leaves the chain as it was.
    /// Returns the number of evicted records.
    pub fn prune_to(&mut self, max: usize) -> Result<usize> {
        let mut removed = 0;

        while self.records.len() > max {
            let oldest_id = self.records[0].version_id.clone();

            let dependents: Vec<usize> = self
                .records
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, r)| r.base_version_id.as_ref() == Some(&oldest_id))
                .map(|(i, _)| i)
                .collect();

            let mut rebased = Vec::with_capacity(dependents.len());
            for i in dependents {
                let state = self.materialize(i)?;
                rebased.push((i, encode_full(&state, self.encoding)?));
            }

            for (i, payload) in rebased {
                let record = &mut self.records[i];
                debug!(
                    entity_id = %self.entity_id,
                    version_id = %record.version_id,
                    "rebased delta into full snapshot"
                );
                record.rebase(payload);
            }

            if let Some(evicted) = self.records.pop_front() {
                self.sequences.remove(&evicted.version_id);
                self.cache.pop(&evicted.version_id);
            }
            self.head = self.head.map(|h| h.saturating_sub(1));
            if self.records.is_empty() {
                self.head = None;
            }
            removed += 1;
        }

        Ok(removed)
    }

    /// Drop every record. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        self.sequences.clear();
        self.cache.clear();
        self.head = None;
        removed
    }

    fn record_at(&self, index: usize) -> Result<&VersionRecord> {
        self.records.get(index).ok_or_else(|| {
            StoreError::CorruptChain(format!(
                "index {} out of range for chain of {}",
                index,
                self.records.len()
            ))
        })
    }

    /// Position of the base of the delta at `index`. Bases must be older.
    fn base_position(&self, index: usize) -> Result<usize> {
        let record = self.record_at(index)?;
        let base = record.base_version_id.as_ref().ok_or_else(|| {
            StoreError::CorruptChain(format!("delta {} has no base", record.version_id))
        })?;
        let position = self.position(base).ok_or_else(|| {
            StoreError::CorruptChain(format!(
                "base {} of {} is not in the chain",
                base, record.version_id
            ))
        })?;
        if position >= index {
            return Err(StoreError::CorruptChain(format!(
                "base {} of {} is not older than it",
                base, record.version_id
            )));
        }
        Ok(position)
    }

    #[cfg(test)]
    pub(crate) fn record_mut(&mut self, index: usize) -> Option<&mut VersionRecord> {
        self.records.get_mut(index)
    }

    #[cfg(test)]
    pub(crate) fn clear_cache(&mut self) {
        self.cache.clear();
    }
}
