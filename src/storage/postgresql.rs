//! PostgreSQL-based snapshot store.
//!
//! Connections come from a `deadpool-postgres` pool with bounded wait, create
//! and recycle timeouts. The pool is created lazily, so constructing the store
//! never touches the network; a bad target or an unreachable server surfaces
//! as [`Error::Connectivity`] on first use. A checked-out connection goes back
//! to the pool when it is dropped, and an uncommitted transaction is rolled
//! back when it is dropped, so every exit path releases both.

use crate::config::DatabaseSettings;
use crate::models::{Snapshot, SnapshotId, normalize_payload};
use crate::storage::schema;
use crate::storage::traits::SnapshotBackend;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use serde_json::Value;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

/// Pool state. An unparseable target is kept as a cause string so the
/// process can still start and report it per request.
enum PoolState {
    Ready(Pool),
    Invalid(String),
}

/// PostgreSQL-based snapshot store.
pub struct PostgresSnapshotStore {
    /// Connection pool, or why none could be built.
    pool: PoolState,
    /// Table name for snapshots.
    table: String,
    /// Redacted target, for logs.
    target: String,
}

/// Helper to map pool errors.
fn pool_error(e: impl std::fmt::Display) -> Error {
    Error::Connectivity {
        cause: e.to_string(),
    }
}

/// Helper to map query errors.
fn query_error(op: &str, e: impl std::fmt::Display) -> Error {
    Error::Query {
        operation: op.to_string(),
        cause: e.to_string(),
    }
}

/// Helper to map schema errors.
fn schema_error(e: impl std::fmt::Display) -> Error {
    Error::SchemaInit {
        cause: e.to_string(),
    }
}

impl PostgresSnapshotStore {
    /// Creates a store for the target resolved from `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the table name is invalid. Connection
    /// problems are deferred to the first operation.
    pub fn new(settings: &DatabaseSettings) -> Result<Self> {
        schema::validate_identifier(&settings.table)?;

        let target = settings.resolve();
        let pool = match Self::build_pool(target.uri(), settings) {
            Ok(pool) => PoolState::Ready(pool),
            Err(cause) => {
                tracing::warn!(
                    db = %target,
                    error = %cause,
                    "Connection target is unusable; every operation will fail"
                );
                PoolState::Invalid(cause)
            },
        };

        Ok(Self {
            pool,
            table: settings.table.clone(),
            target: target.redacted(),
        })
    }

    /// Parses the target and builds the pool.
    fn build_pool(uri: &str, settings: &DatabaseSettings) -> std::result::Result<Pool, String> {
        let mut config = uri
            .parse::<tokio_postgres::Config>()
            .map_err(|e| format!("invalid connection target: {e}"))?;

        if config.get_connect_timeout().is_none() {
            config.connect_timeout(settings.timeout);
        }
        if config.get_options().is_none() {
            config.options(format!(
                "-c statement_timeout={}",
                duration_millis(settings.timeout)
            ));
        }

        let manager = Manager::from_config(
            config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        Pool::builder(manager)
            .max_size(settings.pool_max_size)
            .wait_timeout(Some(settings.timeout))
            .create_timeout(Some(settings.timeout))
            .recycle_timeout(Some(settings.timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| e.to_string())
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the redacted connection target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Checks out a connection.
    async fn client(&self) -> Result<Object> {
        match &self.pool {
            PoolState::Ready(pool) => pool.get().await.map_err(pool_error),
            PoolState::Invalid(cause) => Err(Error::Connectivity {
                cause: cause.clone(),
            }),
        }
    }

    /// Converts a database row to a Snapshot.
    fn row_to_snapshot(row: &Row) -> Result<Snapshot> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| query_error("decode_id", e))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| query_error("decode_created_at", e))?;
        let payload: Option<Value> = row
            .try_get("snapshot")
            .map_err(|e| query_error("decode_snapshot", e))?;

        Ok(Snapshot {
            id: SnapshotId::new(id),
            created_at,
            payload,
        })
    }
}

impl SnapshotBackend for PostgresSnapshotStore {
    async fn initialize(&self) -> Result<()> {
        let mut client = self.client().await?;

        // Statements and their commit succeed or fail together.
        let tx = client.transaction().await.map_err(schema_error)?;
        for statement in schema::statements(&self.table) {
            tx.execute(statement.as_str(), &[])
                .await
                .map_err(schema_error)?;
        }
        tx.commit().await.map_err(schema_error)?;

        tracing::info!(table = %self.table, db = %self.target, "Snapshot table ready");
        Ok(())
    }

    async fn save(&self, payload: Option<Value>) -> Result<Snapshot> {
        let payload = normalize_payload(payload);
        let mut client = self.client().await?;

        let insert = format!(
            "INSERT INTO {} (snapshot) VALUES ($1) RETURNING id, created_at, snapshot",
            self.table
        );

        let tx = client
            .transaction()
            .await
            .map_err(|e| query_error("postgres_snapshot_save_begin", e))?;
        let row = tx
            .query_one(insert.as_str(), &[&payload])
            .await
            .map_err(|e| query_error("postgres_snapshot_save", e))?;
        let snapshot = Self::row_to_snapshot(&row)?;
        tx.commit()
            .await
            .map_err(|e| query_error("postgres_snapshot_save_commit", e))?;

        tracing::debug!(id = %snapshot.id, table = %self.table, "Saved snapshot");
        Ok(snapshot)
    }

    async fn list(&self) -> Result<Vec<Snapshot>> {
        let client = self.client().await?;

        let query = format!(
            "SELECT id, created_at, snapshot FROM {} ORDER BY created_at DESC, id DESC",
            self.table
        );

        let rows = client
            .query(query.as_str(), &[])
            .await
            .map_err(|e| query_error("postgres_snapshot_list", e))?;

        rows.iter().map(Self::row_to_snapshot).collect()
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| query_error("postgres_ping", e))?;
        Ok(())
    }
}

/// Milliseconds in `d`, saturating.
fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
