//! HTTP surface.
//!
//! | Method & Path | Handler |
//! |---|---|
//! | `GET /` | [`handlers::home`] |
//! | `GET /api/health` | [`handlers::health`] |
//! | `GET /api/data` | [`handlers::data`] |
//! | `GET /api/db/test` | [`handlers::db_test`] |
//! | `GET /api/test/environment-variables` | [`handlers::environment`] |
//! | `POST /api/calls` | [`handlers::create_call`] |
//! | `GET /api/calls` | [`handlers::list_calls`] |

pub mod handlers;
pub mod response;

use crate::config::DatabaseSettings;
use crate::storage::SnapshotBackend;
use crate::{Error, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::routing::get;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared handler state.
pub struct AppState<B> {
    /// Snapshot store.
    pub store: Arc<B>,
    /// Redacted database settings for the diagnostics route.
    pub database: DatabaseInfo,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            database: self.database.clone(),
        }
    }
}

impl<B: SnapshotBackend> AppState<B> {
    /// Creates handler state.
    pub fn new(store: Arc<B>, settings: &DatabaseSettings) -> Self {
        Self {
            store,
            database: DatabaseInfo::from_settings(settings),
        }
    }
}

/// Database settings safe to expose over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    /// `"url"` when a combined URI is in effect, otherwise `"fields"`.
    pub source: &'static str,
    /// Redacted connection target.
    pub target: String,
    /// Host.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Database name.
    pub name: String,
    /// User.
    pub user: String,
    /// Whether a non-empty password is configured.
    pub password_set: bool,
    /// Snapshot table.
    pub table: String,
}

impl DatabaseInfo {
    /// Builds the redacted view of `settings`.
    #[must_use]
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        Self {
            source: if settings.uses_url() { "url" } else { "fields" },
            target: settings.resolve().redacted(),
            host: settings.host.clone(),
            port: settings.port,
            name: settings.name.clone(),
            user: settings.user.clone(),
            password_set: !settings.password.expose_secret().is_empty(),
            table: settings.table.clone(),
        }
    }
}

/// Builds the application router.
pub fn router<B: SnapshotBackend>(state: AppState<B>) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/api/health", get(handlers::health))
        .route("/api/data", get(handlers::data))
        .route("/api/db/test", get(handlers::db_test::<B>))
        .route(
            "/api/test/environment-variables",
            get(handlers::environment::<B>),
        )
        .route(
            "/api/calls",
            get(handlers::list_calls::<B>).post(handlers::create_call::<B>),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `state` on `bind` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve<B: SnapshotBackend>(bind: SocketAddr, state: AppState<B>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{bind}: {e}"),
        })?;

    tracing::info!(addr = %bind, "Starting HTTP server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
