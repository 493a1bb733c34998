//! Snapshot backend trait.

use crate::Result;
use crate::models::Snapshot;
use serde_json::Value;
use std::future::Future;

/// Trait for snapshot storage backends.
///
/// Every call acquires its own connection and releases it on all exit paths,
/// so calls succeed or fail independently of each other.
pub trait SnapshotBackend: Send + Sync + 'static {
    /// Ensures the snapshot table exists. Safe to call repeatedly.
    fn initialize(&self) -> impl Future<Output = Result<()>> + Send;

    /// Stores a payload and returns the populated snapshot.
    ///
    /// An absent payload and a JSON `null` are both stored as absent.
    fn save(&self, payload: Option<Value>) -> impl Future<Output = Result<Snapshot>> + Send;

    /// Returns every snapshot, most recent `created_at` first.
    ///
    /// Order among equal timestamps is unspecified.
    fn list(&self) -> impl Future<Output = Result<Vec<Snapshot>>> + Send;

    /// Checks that the backing store is reachable.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}
