//! # Delta Store
//!
//! A versioned state store with delta compression: snapshots of an
//! arbitrary JSON-shaped state are kept as a chain of one full snapshot and
//! structural deltas, any retained version can be reconstructed, and a
//! bounded retention window is enforced without breaking reconstruction.
//!
//! ## Core Concepts
//!
//! - **Delta codec**: Pure structural `diff`/`apply` over `serde_json::Value`
//! - **Version chain**: Full and delta records linked by explicit base IDs
//! - **Pruning**: FIFO eviction that rebases dependents into full snapshots
//! - **Change sets**: Formatted diffs between any two stored versions
//! - **Convergence**: Trend heuristics over successive change sets
//!
//! ## Example
//!
//! ```
//! use deltastore::{StoreConfig, VersionChainStore};
//! use serde_json::json;
//!
//! let mut store = VersionChainStore::new("doc", StoreConfig::default()).unwrap();
//!
//! let v1 = store.create_snapshot(&json!({"a": 1}), None).unwrap();
//! let v2 = store.create_snapshot(&json!({"a": 1, "b": 2}), None).unwrap();
//!
//! let changes = store.compare_versions(&v1, &v2).unwrap();
//! assert_eq!(changes.summary, "1 changes: 1 additions, 0 modifications, 0 deletions");
//!
//! assert_eq!(store.restore_version(&v1).unwrap(), json!({"a": 1}));
//! ```

pub mod chain;
pub mod changeset;
pub mod convergence;
pub mod delta;
pub mod error;
pub mod registry;
pub mod stats;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use chain::{RecordPayload, VersionChain, VersionRecord};
pub use changeset::{
    AdditionEntry, ChangeReason, ChangeSet, ChangeSetFormatter, DeletionEntry, ModificationEntry,
};
pub use convergence::{ConvergenceConfig, ConvergenceEstimator, ConvergenceMetrics, HistoryEntry};
pub use delta::{
    apply, decode_full, diff, encode_full, value_at, Addition, DeltaPatch, FullPayload, LiveValue,
    Modification, Path, PathSegment, Projection, SnapshotSource,
};
pub use error::{Result, StoreError};
pub use registry::{SharedStore, StoreRegistry};
pub use stats::PerformanceStats;
pub use store::{ExportedHistory, PruneOutcome, StoreConfig, VersionChainStore};
pub use subscriptions::{
    ChainEvent, DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
pub use types::*;
