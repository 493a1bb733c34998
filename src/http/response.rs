//! JSON response envelopes.

use crate::Error;
use crate::models::Snapshot;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// `{"status": "success", "data": ...}`.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    /// Always `"success"`.
    pub status: &'static str,
    /// Payload.
    pub data: T,
}

impl<T> DataEnvelope<T> {
    /// Wraps `data` in a success envelope.
    pub const fn new(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// `{"status": "success", "count": n, "data": [...]}`.
#[derive(Debug, Serialize)]
pub struct ListEnvelope {
    /// Always `"success"`.
    pub status: &'static str,
    /// Number of snapshots in `data`.
    pub count: usize,
    /// Snapshots, newest first.
    pub data: Vec<Snapshot>,
}

impl ListEnvelope {
    /// Wraps a materialized listing.
    #[must_use]
    pub fn new(data: Vec<Snapshot>) -> Self {
        Self {
            status: "success",
            count: data.len(),
            data,
        }
    }
}

/// `{"status": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    /// `"success"` or `"error"`.
    pub status: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// Error response: HTTP 500 with `{"status": "error", "message": ...}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = MessageEnvelope {
            status: "error",
            message: self.0.public_message(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotId;
    use chrono::Utc;

    #[test]
    fn test_list_envelope_counts() {
        let envelope = ListEnvelope::new(vec![Snapshot {
            id: SnapshotId::new(1),
            created_at: Utc::now(),
            payload: None,
        }]);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["count"], 1);
        assert_eq!(value["data"][0]["id"], 1);
    }

    #[test]
    fn test_api_error_is_500() {
        let response = ApiError(Error::Connectivity {
            cause: "refused".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
