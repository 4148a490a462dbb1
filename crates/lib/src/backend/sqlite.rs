//! SQLite key-value backend.
//!
//! Every write is committed before the call returns, so a server using this
//! backend loses nothing when it stops without a graceful shutdown.
//!
//! One database file can hold several independent key spaces: each [`Sqlite`]
//! handle is bound to a namespace, and [`Sqlite::namespace`] derives a handle
//! for another one that shares the same connection pool.

use std::{path::Path, str::FromStr, time::Duration};

use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

use super::{KvBackend, errors::BackendError};
use crate::Result;

/// Current schema version.
///
/// Increment this when making schema changes that require migration.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version BIGINT PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS kv (
        namespace TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (namespace, key)
    )",
];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_NAMESPACE: &str = "default";

pub(crate) trait SqlxResultExt<T> {
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            BackendError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// A [`KvBackend`] stored in one table of a SQLite database.
#[derive(Debug, Clone)]
pub struct Sqlite {
    pool: SqlitePool,
    namespace: String,
}

impl Sqlite {
    /// Opens (creating if needed) the database file at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .sql_context("Failed to open SQLite database")?;
        Self::initialize(pool).await
    }

    /// A private in-memory database, gone when the last handle is dropped.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .sql_context("Invalid SQLite URL")?
            .busy_timeout(BUSY_TIMEOUT);
        // Every connection to `:memory:` is a separate database, so the pool
        // keeps exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .sql_context("Failed to create in-memory SQLite database")?;
        Self::initialize(pool).await
    }

    /// A handle on the key space `namespace` of the same database.
    pub fn namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            pool: self.pool.clone(),
            namespace: namespace.into(),
        }
    }

    async fn initialize(pool: SqlitePool) -> Result<Self> {
        for statement in CREATE_TABLES {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .sql_context("Schema creation failed")?;
        }

        let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version")
            .fetch_optional(&pool)
            .await
            .sql_context("Failed to check schema version")?;
        match row {
            None => {
                sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                    .bind(SCHEMA_VERSION)
                    .execute(&pool)
                    .await
                    .sql_context("Failed to initialize schema version")?;
            }
            Some((version,)) if version > SCHEMA_VERSION => {
                return Err(BackendError::SqlxError {
                    reason: format!(
                        "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
                    ),
                    source: None,
                }
                .into());
            }
            Some(_) => {}
        }

        Ok(Self {
            pool,
            namespace: DEFAULT_NAMESPACE.to_string(),
        })
    }
}

#[async_trait]
impl KvBackend for Sqlite {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv WHERE namespace = ? AND key = ?")
                .bind(self.namespace.as_str())
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .sql_context("Failed to read value")?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv (namespace, key, value) VALUES (?, ?, ?)
             ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value",
        )
        .bind(self.namespace.as_str())
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .sql_context("Failed to write value")?;
        Ok(())
    }

    async fn put_if_present(&self, key: &str, value: String) -> Result<bool> {
        let result = sqlx::query("UPDATE kv SET value = ? WHERE namespace = ? AND key = ?")
            .bind(value)
            .bind(self.namespace.as_str())
            .bind(key)
            .execute(&self.pool)
            .await
            .sql_context("Failed to replace value")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE namespace = ? AND key = ?")
            .bind(self.namespace.as_str())
            .bind(key)
            .execute(&self.pool)
            .await
            .sql_context("Failed to delete value")?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM kv WHERE namespace = ?")
            .bind(self.namespace.as_str())
            .fetch_all(&self.pool)
            .await
            .sql_context("Failed to list keys")?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}
