//! In-memory snapshot backend.
//!
//! Non-persistent implementation of [`SnapshotBackend`] for local development
//! and tests. Data is lost when the process exits.

use crate::models::{Snapshot, SnapshotId, normalize_payload};
use crate::storage::traits::SnapshotBackend;
use crate::{Error, Result};
use chrono::Utc;
use serde_json::Value;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory snapshot backend.
///
/// Can be taken offline to exercise connectivity failures without a database.
///
/// # Example
///
/// ```rust,ignore
/// use callsnap::storage::{InMemorySnapshotStore, SnapshotBackend};
///
/// let store = InMemorySnapshotStore::new();
/// let saved = store.save(None).await?;
/// assert_eq!(store.list().await?.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    rows: RwLock<Vec<Snapshot>>,
    offline: AtomicBool,
}

fn lock_error() -> Error {
    Error::Query {
        operation: "memory_lock".to_string(),
        cause: "snapshot store lock poisoned".to_string(),
    }
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with a connectivity error, or
    /// restores normal operation.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns the number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Connectivity {
                cause: "in-memory store is offline".to_string(),
            });
        }
        Ok(())
    }
}

impl SnapshotBackend for InMemorySnapshotStore {
    async fn initialize(&self) -> Result<()> {
        self.check_online()
    }

    async fn save(&self, payload: Option<Value>) -> Result<Snapshot> {
        self.check_online()?;
        let mut rows = self.rows.write().map_err(|_| lock_error())?;

        let next = rows.last().map_or(1, |s| s.id.get() + 1);
        // Keep created_at non-decreasing even if the wall clock steps back.
        let now = Utc::now();
        let created_at = rows.last().map_or(now, |s| s.created_at.max(now));

        let snapshot = Snapshot {
            id: SnapshotId::new(next),
            created_at,
            payload: normalize_payload(payload),
        };
        rows.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list(&self) -> Result<Vec<Snapshot>> {
        self.check_online()?;
        let rows = self.rows.read().map_err(|_| lock_error())?;

        let mut snapshots = rows.clone();
        snapshots.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(snapshots)
    }

    async fn ping(&self) -> Result<()> {
        self.check_online()
    }
}
