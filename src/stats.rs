//! Rolling performance metrics.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Point-in-time performance summary of a store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Snapshots created since the store was built or last cleared.
    pub snapshot_count: u64,
    pub restore_count: u64,
    /// Averages and maxima over the most recent samples only.
    pub avg_snapshot_ms: f64,
    pub max_snapshot_ms: f64,
    pub avg_restore_ms: f64,
    pub sample_window: usize,
    /// Sum of stored payload sizes of retained versions.
    pub storage_bytes: usize,
    pub full_count: usize,
    pub delta_count: usize,
}

/// Bounded sample windows for snapshot and restore timings.
#[derive(Debug)]
pub(crate) struct PerformanceTracker {
    window: usize,
    snapshot_samples: VecDeque<f64>,
    restore_samples: VecDeque<f64>,
    snapshot_count: u64,
    restore_count: u64,
}

impl PerformanceTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            snapshot_samples: VecDeque::with_capacity(window),
            restore_samples: VecDeque::with_capacity(window),
            snapshot_count: 0,
            restore_count: 0,
        }
    }

    pub fn record_snapshot(&mut self, duration_ms: f64) {
        self.snapshot_count += 1;
        push_bounded(&mut self.snapshot_samples, duration_ms, self.window);
    }

    pub fn record_restore(&mut self, duration_ms: f64) {
        self.restore_count += 1;
        push_bounded(&mut self.restore_samples, duration_ms, self.window);
    }

    pub fn reset(&mut self) {
        self.snapshot_samples.clear();
        self.restore_samples.clear();
        self.snapshot_count = 0;
        self.restore_count = 0;
    }

    /// Summary with the chain's storage figures filled in by the caller.
    pub fn summary(&self, storage_bytes: usize, full_count: usize, delta_count: usize) -> PerformanceStats {
        PerformanceStats {
            snapshot_count: self.snapshot_count,
            restore_count: self.restore_count,
            avg_snapshot_ms: mean(&self.snapshot_samples),
            max_snapshot_ms: self.snapshot_samples.iter().copied().fold(0.0, f64::max),
            avg_restore_ms: mean(&self.restore_samples),
            sample_window: self.window,
            storage_bytes,
            full_count,
            delta_count,
        }
    }

    #[cfg(test)]
    fn snapshot_samples(&self) -> usize {
        self.snapshot_samples.len()
    }
}

fn push_bounded(samples: &mut VecDeque<f64>, value: f64, window: usize) {
    if samples.len() == window {
        samples.pop_front();
    }
    samples.push_back(value);
}

fn mean(samples: &VecDeque<f64>) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}
