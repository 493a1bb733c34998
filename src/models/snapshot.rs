//! Snapshot types and identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Store-assigned snapshot identifier.
///
/// Strictly increasing in insertion order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(i64);

impl SnapshotId {
    /// Creates a snapshot ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SnapshotId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A persisted JSON payload with server-assigned identity and timestamp.
///
/// Serializes as `{"id", "created_at", "snapshot"}`, with `created_at` in
/// RFC 3339 and an absent payload as `null`. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier.
    pub id: SnapshotId,
    /// Insertion time, assigned by the store.
    pub created_at: DateTime<Utc>,
    /// Caller-supplied payload, stored opaquely.
    #[serde(rename = "snapshot")]
    pub payload: Option<Value>,
}

/// Collapses a JSON `null` payload into an absent one.
///
/// Both are stored as SQL `NULL` and serialize identically.
#[must_use]
pub fn normalize_payload(payload: Option<Value>) -> Option<Value> {
    payload.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_wire_shape() {
        let created_at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        let snapshot = Snapshot {
            id: SnapshotId::new(7),
            created_at,
            payload: Some(json!({"key": "value"})),
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["snapshot"], json!({"key": "value"}));
        assert_eq!(value["created_at"], json!("2026-01-02T03:04:05.123456Z"));
    }

    #[test]
    fn test_absent_payload_serializes_as_null() {
        let snapshot = Snapshot {
            id: SnapshotId::new(1),
            created_at: Utc::now(),
            payload: None,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("snapshot").is_some());
        assert!(value["snapshot"].is_null());
    }

    #[test]
    fn test_normalize_payload() {
        assert_eq!(normalize_payload(None), None);
        assert_eq!(normalize_payload(Some(Value::Null)), None);
        assert_eq!(normalize_payload(Some(json!(0))), Some(json!(0)));
        assert_eq!(normalize_payload(Some(json!([]))), Some(json!([])));
        assert_eq!(normalize_payload(Some(json!(false))), Some(json!(false)));
    }

    #[test]
    fn test_snapshot_id_ordering() {
        assert!(SnapshotId::new(2) > SnapshotId::new(1));
        assert_eq!(SnapshotId::from(5).get(), 5);
        assert_eq!(SnapshotId::new(42).to_string(), "42");
    }
}
