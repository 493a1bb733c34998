//! HTTP API tests.
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`, backed by
//! the in-memory store, plus a PostgreSQL store pointed at an address where
//! nothing listens.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use callsnap::config::DatabaseSettings;
use callsnap::http::{AppState, MAX_BODY_BYTES, router};
use callsnap::storage::{InMemorySnapshotStore, PostgresSnapshotStore};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn memory_app() -> (Router, Arc<InMemorySnapshotStore>) {
    let store = Arc::new(InMemorySnapshotStore::new());
    let state = AppState::new(Arc::clone(&store), &DatabaseSettings::default());
    (router(state), store)
}

fn unreachable_app() -> Router {
    let settings = DatabaseSettings {
        host: "127.0.0.1".to_string(),
        port: 1,
        timeout: Duration::from_secs(2),
        ..DatabaseSettings::default()
    };
    let store = Arc::new(PostgresSnapshotStore::new(&settings).unwrap());
    router(AppState::new(store, &settings))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn test_post_object_returns_created_snapshot() {
    let (app, _) = memory_app();

    let (status, body) = send(&app, Method::POST, "/api/calls", Some(r#"{"key":"value"}"#)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["snapshot"], json!({"key": "value"}));
    assert!(body["data"]["id"].as_i64().unwrap() > 0);

    let created_at = body["data"]["created_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
}

#[tokio::test]
async fn test_post_empty_body_stores_null() {
    let (app, store) = memory_app();

    let (status, body) = send(&app, Method::POST, "/api/calls", None).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"]["snapshot"].is_null());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_post_scalar_and_array_payloads() {
    let (app, _) = memory_app();

    for payload in ["42", "\"text\"", "[1,2,3]", "true", "null"] {
        let (status, body) = send(&app, Method::POST, "/api/calls", Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED, "payload {payload}");
        let expected: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(body["data"]["snapshot"], expected);
    }
}

#[tokio::test]
async fn test_post_invalid_json_is_error() {
    let (app, store) = memory_app();

    let (status, body) = send(&app, Method::POST, "/api/calls", Some("{nope")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(!body["message"].as_str().unwrap().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_oversized_body_gets_error_envelope() {
    let (app, store) = memory_app();
    let blob = "x".repeat(MAX_BODY_BYTES + 1);
    let payload = json!({ "blob": blob }).to_string();

    let (status, body) = send(&app, Method::POST, "/api/calls", Some(&payload)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(!body["message"].as_str().unwrap().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_body_at_limit_is_accepted() {
    let (app, _) = memory_app();
    let overhead = r#"{"blob":""}"#.len();
    let payload = json!({ "blob": "x".repeat(MAX_BODY_BYTES - overhead) }).to_string();
    assert_eq!(payload.len(), MAX_BODY_BYTES);

    let (status, body) = send(&app, Method::POST, "/api/calls", Some(&payload)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn test_list_empty_table() {
    let (app, _) = memory_app();

    let (status, body) = send(&app, Method::GET, "/api/calls", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["count"], 0);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_list_returns_newest_first() {
    let (app, _) = memory_app();

    let mut ids = Vec::new();
    for i in 0..3 {
        let payload = json!({ "n": i }).to_string();
        let (_, body) = send(&app, Method::POST, "/api/calls", Some(&payload)).await;
        ids.push(body["data"]["id"].as_i64().unwrap());
    }
    assert!(ids.windows(2).all(|w| w[1] > w[0]));

    let (status, body) = send(&app, Method::GET, "/api/calls", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let data = body["data"].as_array().unwrap();
    let times: Vec<_> = data
        .iter()
        .map(|s| chrono::DateTime::parse_from_rfc3339(s["created_at"].as_str().unwrap()).unwrap())
        .collect();
    assert!(times.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(data[0]["snapshot"], json!({"n": 2}));
}

#[tokio::test]
async fn test_offline_store_returns_generic_error() {
    let (app, store) = memory_app();
    store.set_offline(true);

    let (status, body) = send(&app, Method::POST, "/api/calls", Some("{}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "database unavailable");

    let (status, body) = send(&app, Method::GET, "/api/calls", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_unreachable_database_returns_500() {
    let app = unreachable_app();

    let (status, body) = send(&app, Method::POST, "/api/calls", Some(r#"{"a":1}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(!body["message"].as_str().unwrap().is_empty());

    let (status, body) = send(&app, Method::GET, "/api/calls", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");

    let (status, body) = send(&app, Method::GET, "/api/db/test", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_static_routes() {
    let (app, _) = memory_app();

    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (status, body) = send(&app, Method::GET, "/api/db/test", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn test_environment_route_hides_password() {
    let settings = DatabaseSettings {
        password: secrecy::SecretString::from("s3cret@pw"),
        ..DatabaseSettings::default()
    };
    let store = Arc::new(InMemorySnapshotStore::new());
    let app = router(AppState::new(store, &settings));

    let (status, body) = send(&app, Method::GET, "/api/test/environment-variables", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "fields");
    assert_eq!(body["data"]["password_set"], true);
    assert_eq!(body["data"]["host"], "localhost");
    assert!(!body.to_string().contains("s3cret"));
}

#[tokio::test]
async fn test_degraded_start_recovers_when_database_returns() {
    use callsnap::storage::SnapshotBackend;

    let (app, store) = memory_app();
    store.set_offline(true);
    assert!(store.initialize().await.is_err());

    // The service still answers while the database is away.
    let (status, _) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::POST, "/api/calls", Some("{}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");

    store.set_offline(false);
    let (status, _) = send(&app, Method::POST, "/api/calls", Some("{}")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = send(&app, Method::GET, "/api/calls", None).await;
    assert_eq!(body["count"], 1);
}
