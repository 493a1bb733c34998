//! # Callsnap
//!
//! An HTTP service that persists arbitrary JSON "snapshots" with a
//! server-assigned identity and timestamp, and lists them newest first.
//!
//! ## Components
//!
//! - Connection resolution ([`config::DatabaseSettings::resolve`]): one
//!   connection target from either a combined URI or discrete fields
//! - Snapshot storage ([`storage::PostgresSnapshotStore`]): idempotent schema
//!   setup plus the save and list operations
//! - HTTP surface ([`http::router`]): JSON envelopes over the store
//!
//! ## Example
//!
//! ```rust,ignore
//! use callsnap::config::ServiceConfig;
//! use callsnap::storage::{PostgresSnapshotStore, SnapshotBackend};
//!
//! let config = ServiceConfig::from_env()?;
//! let store = PostgresSnapshotStore::new(&config.database)?;
//! store.initialize().await?;
//! let snapshot = store.save(Some(serde_json::json!({"key": "value"}))).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod http;
pub mod models;
pub mod observability;
pub mod storage;

pub use config::{ConnectionTarget, DatabaseSettings, ServiceConfig};
pub use models::{Snapshot, SnapshotId};
pub use storage::{InMemorySnapshotStore, PostgresSnapshotStore, SnapshotBackend};

/// Error type for callsnap operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Connectivity` | A database connection cannot be obtained |
/// | `Query` | A statement fails after a connection was obtained |
/// | `SchemaInit` | Creating the snapshot table fails |
/// | `InvalidInput` | A request body is not valid JSON |
/// | `Config` | Configuration cannot be read or is invalid |
/// | `OperationFailed` | Process-level failures (bind, serve, logging setup) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The database could not be reached.
    ///
    /// Raised when:
    /// - The pool cannot create or hand out a connection
    /// - The connection target cannot be parsed
    /// - A pool timeout elapses
    #[error("database unavailable: {cause}")]
    Connectivity {
        /// The underlying cause.
        cause: String,
    },

    /// A statement failed.
    ///
    /// Any open transaction has been rolled back by the time this is returned.
    #[error("query '{operation}' failed: {cause}")]
    Query {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Schema initialization failed.
    #[error("schema initialization failed: {cause}")]
    SchemaInit {
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is invalid or unreadable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Message safe to show to HTTP clients.
    ///
    /// Connectivity failures collapse to a generic message; everything else
    /// carries its cause.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Connectivity { .. } => "database unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for callsnap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("bad body".to_string());
        assert_eq!(err.to_string(), "invalid input: bad body");

        let err = Error::Query {
            operation: "save".to_string(),
            cause: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "query 'save' failed: boom");

        let err = Error::SchemaInit {
            cause: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "schema initialization failed: permission denied"
        );
    }

    #[test]
    fn test_public_message_hides_connectivity_cause() {
        let err = Error::Connectivity {
            cause: "password authentication failed for user \"admin\"".to_string(),
        };
        assert_eq!(err.public_message(), "database unavailable");

        let err = Error::Query {
            operation: "list".to_string(),
            cause: "relation \"calls\" does not exist".to_string(),
        };
        assert!(err.public_message().contains("does not exist"));
    }
}
