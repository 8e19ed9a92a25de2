//! Structural delta codec.
//!
//! Pure functions over `serde_json::Value` trees:
//! - [`diff`] / [`apply`] compute and replay structural patches, with
//!   `apply(a, &diff(a, b)) == b` for every pair of trees
//! - [`encode_full`] / [`decode_full`] serialize whole snapshots
//! - [`SnapshotSource`] projects possibly-cyclic host graphs into trees

mod patch;
mod path;
mod payload;
mod projection;

pub use patch::{apply, diff, value_at, Addition, DeltaPatch, Modification};
pub use path::{Path, PathSegment};
pub use payload::{decode_full, encode_full, patch_size, FullPayload};
pub use projection::{LiveValue, Projection, SnapshotSource};
