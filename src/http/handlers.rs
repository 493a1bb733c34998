//! Route handlers.
//!
//! Every storage error is converted into an [`ApiError`] here; nothing
//! propagates past the handler as a fault.

use super::AppState;
use super::response::{ApiError, DataEnvelope, ListEnvelope, MessageEnvelope};
use crate::observability::metrics::{
    HTTP_ERRORS, SNAPSHOT_LISTS, SNAPSHOT_SAVE_FAILURES, SNAPSHOTS_SAVED,
};
use crate::storage::SnapshotBackend;
use crate::{Error, Result};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

/// `GET /`
pub async fn home() -> impl IntoResponse {
    Json(json!({"message": "Hello from callsnap!"}))
}

/// `GET /api/health`
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}

/// `GET /api/data`
pub async fn data() -> impl IntoResponse {
    Json(json!({"message": "Data from callsnap!"}))
}

/// `GET /api/db/test`: round trip to the database.
pub async fn db_test<B: SnapshotBackend>(
    State(state): State<AppState<B>>,
) -> std::result::Result<Json<MessageEnvelope>, ApiError> {
    state.store.ping().await.map_err(|e| {
        tracing::warn!(error = %e, "Database connectivity check failed");
        metrics::counter!(HTTP_ERRORS, "route" => "db_test").increment(1);
        ApiError(e)
    })?;

    Ok(Json(MessageEnvelope {
        status: "success",
        message: "database connection ok".to_string(),
    }))
}

/// `GET /api/test/environment-variables`: effective database settings,
/// password reported only as set or unset.
pub async fn environment<B: SnapshotBackend>(
    State(state): State<AppState<B>>,
) -> impl IntoResponse {
    Json(DataEnvelope::new(state.database.clone()))
}

/// `POST /api/calls`: stores the request body as a snapshot.
///
/// A body that cannot be read, including one over [`super::MAX_BODY_BYTES`],
/// gets the same error envelope as any other failure.
pub async fn create_call<B: SnapshotBackend>(
    State(state): State<AppState<B>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let payload = body
        .map_err(|e| Error::InvalidInput(format!("request body could not be read: {e}")))
        .and_then(|body| parse_payload(&body));

    let saved = match payload {
        Ok(payload) => state.store.save(payload).await,
        Err(e) => Err(e),
    };

    match saved {
        Ok(snapshot) => {
            metrics::counter!(SNAPSHOTS_SAVED).increment(1);
            tracing::info!(id = %snapshot.id, "Snapshot created");
            Ok((StatusCode::CREATED, Json(DataEnvelope::new(snapshot))))
        },
        Err(e) => {
            metrics::counter!(SNAPSHOT_SAVE_FAILURES).increment(1);
            metrics::counter!(HTTP_ERRORS, "route" => "create_call").increment(1);
            tracing::error!(error = %e, "Failed to save snapshot");
            Err(ApiError(e))
        },
    }
}

/// `GET /api/calls`: every snapshot, newest first.
pub async fn list_calls<B: SnapshotBackend>(
    State(state): State<AppState<B>>,
) -> std::result::Result<Json<ListEnvelope>, ApiError> {
    match state.store.list().await {
        Ok(snapshots) => {
            metrics::counter!(SNAPSHOT_LISTS, "status" => "success").increment(1);
            Ok(Json(ListEnvelope::new(snapshots)))
        },
        Err(e) => {
            metrics::counter!(SNAPSHOT_LISTS, "status" => "error").increment(1);
            metrics::counter!(HTTP_ERRORS, "route" => "list_calls").increment(1);
            tracing::error!(error = %e, "Failed to list snapshots");
            Err(ApiError(e))
        },
    }
}

/// Parses a request body. Empty or whitespace-only bodies carry no payload.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the body is not valid JSON.
pub fn parse_payload(body: &[u8]) -> Result<Option<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("request body is not valid JSON: {e}")))
}
