//! Convergence heuristics over change sets.

use crate::changeset::ChangeSet;
use crate::error::{Result, StoreError};
use crate::store::VersionChainStore;
use crate::types::{Timestamp, VersionId};
use serde::{Deserialize, Serialize};

/// Tuning constants for [`ConvergenceEstimator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Change count at which the score bottoms out at 0.
    pub normalization: usize,

    /// Below this many changes a pair of versions counts as converging.
    pub threshold: usize,

    /// Changes expected to settle per iteration.
    pub rate: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            normalization: 100,
            threshold: 10,
            rate: 5,
        }
    }
}

impl ConvergenceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.normalization == 0 || self.rate == 0 {
            return Err(StoreError::InvalidConfig(
                "convergence normalization and rate must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceMetrics {
    /// In [0, 1]; 1 means nothing changed.
    pub convergence_score: f64,
    pub change_velocity: usize,
    pub is_converging: bool,
    pub estimated_iterations_to_converge: usize,
}

/// One adjacent pair of versions in a history report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from_version: VersionId,
    pub to_version: VersionId,
    pub timestamp: Timestamp,
    pub change_set: ChangeSet,
    pub metrics: ConvergenceMetrics,
}

pub struct ConvergenceEstimator {
    config: ConvergenceConfig,
}

impl ConvergenceEstimator {
    pub fn new(config: ConvergenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    pub fn metrics(&self, change_set: &ChangeSet) -> ConvergenceMetrics {
        let total = change_set.total_changes;
        let normalization = self.config.normalization.max(1) as f64;
        let score = (1.0 - total as f64 / normalization).clamp(0.0, 1.0);

        ConvergenceMetrics {
            convergence_score: score,
            change_velocity: total,
            is_converging: total < self.config.threshold,
            estimated_iterations_to_converge: total.div_ceil(self.config.rate.max(1)),
        }
    }

    /// Metrics for every adjacent pair of versions, oldest first.
    ///
    /// Decompresses and diffs each pair, so cost grows with chain length.
    pub fn history(&self, store: &mut VersionChainStore) -> Result<Vec<HistoryEntry>> {
        let ids: Vec<VersionId> = store
            .list_versions()
            .into_iter()
            .map(|d| d.version_id)
            .collect();

        let mut entries = Vec::with_capacity(ids.len().saturating_sub(1));
        for pair in ids.windows(2) {
            let change_set = store.compare_versions(&pair[0], &pair[1])?;
            let metrics = self.metrics(&change_set);
            entries.push(HistoryEntry {
                from_version: pair[0].clone(),
                to_version: pair[1].clone(),
                timestamp: change_set.to_timestamp,
                change_set,
                metrics,
            });
        }

        Ok(entries)
    }
}

impl Default for ConvergenceEstimator {
    fn default() -> Self {
        Self::new(ConvergenceConfig::default())
    }
}
