//! Data models for callsnap.

mod snapshot;

pub use snapshot::{Snapshot, SnapshotId, normalize_payload};
