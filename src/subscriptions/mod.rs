//! Subscription system for chain events.
//!
//! Stores publish `snapshot_created`, `versions_pruned` and `history_cleared`
//! events; hosts pick their own transport by draining a bounded channel.
//! Subscribers that fall behind their buffer are dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::retention(),
//!     ..Default::default()
//! });
//!
//! while let Ok(event) = handle.try_recv() {
//!     if let ChainEvent::VersionsPruned { removed_count, .. } = event {
//!         println!("evicted {}", removed_count);
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    ChainEvent, DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
