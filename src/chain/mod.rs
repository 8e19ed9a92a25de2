//! Version chains.
//!
//! Each entity owns one chain: a full snapshot followed by deltas, where
//! every delta names its base explicitly. Reconstruction is O(k) in the
//! number of deltas back to the nearest full snapshot, and eviction rebases
//! dependents so every retained version stays reconstructible.

mod record;
mod versions;

pub use record::{RecordPayload, VersionRecord};
pub use versions::VersionChain;
