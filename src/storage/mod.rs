//! Snapshot storage.
//!
//! - [`PostgresSnapshotStore`]: the production backend
//! - [`InMemorySnapshotStore`]: ephemeral backend for development and tests

// Pooled connections are held for the whole operation.
#![allow(clippy::significant_drop_tightening)]

mod memory;
mod postgresql;
pub mod schema;
mod traits;

pub use memory::InMemorySnapshotStore;
pub use postgresql::PostgresSnapshotStore;
pub use traits::SnapshotBackend;
