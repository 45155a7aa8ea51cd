//! SQLite backend.

use std::str::FromStr;

use async_trait::async_trait;
use sea_query::{Value, Values};
use sea_query_binder::SqlxValues;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteStatement};
use sqlx::{Connection, Executor, SqlitePool, Statement};
use tracing::info;

use super::Backend;
use crate::config::StorageConfig;

/// SQLite implementation of [`Backend`] over a connection pool.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect using a descriptor.
    ///
    /// Accepted forms: `sqlite::memory:`, `sqlite://path?opts`, `sqlite:path`,
    /// `file:path?opts`, or a bare file path, which is created if missing.
    /// In-memory descriptors get a one-connection pool regardless of
    /// `max_connections`.
    pub async fn connect(descriptor: &str, config: &StorageConfig) -> Result<Self, sqlx::Error> {
        let mut options = connect_options(descriptor)?;

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if is_in_memory(descriptor) {
            // Pooled connections may each open a private in-memory database,
            // so a single long-lived connection holds the only copy.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            // Concurrent handlers write to the same file.
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = pool_options.connect_with(options).await?;
        info!(descriptor = %descriptor, "Connected to SQLite");
        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn connect_options(descriptor: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    if descriptor.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(descriptor)
    } else if let Some(uri) = descriptor.strip_prefix("file:") {
        SqliteConnectOptions::from_str(&format!("sqlite:{}", uri))
    } else {
        Ok(SqliteConnectOptions::new()
            .filename(descriptor)
            .create_if_missing(true))
    }
}

fn is_in_memory(descriptor: &str) -> bool {
    descriptor.contains(":memory:") || descriptor.contains("mode=memory")
}

#[async_trait]
impl Backend for SqliteBackend {
    type Statement = SqliteStatement<'static>;

    async fn ping(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await
    }

    async fn execute(&self, sql: &'static str) -> Result<(), sqlx::Error> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn prepare(&self, sql: &'static str) -> Result<Self::Statement, sqlx::Error> {
        self.pool.prepare(sql).await
    }

    async fn insert(
        &self,
        statement: &Self::Statement,
        values: Vec<Value>,
    ) -> Result<u64, sqlx::Error> {
        let result = statement
            .query_with(SqlxValues(Values(values)))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EventKind;

    fn single_connection() -> StorageConfig {
        StorageConfig {
            max_connections: 1,
            ..StorageConfig::default()
        }
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("file:test.db?cache=shared&mode=memory"));
        assert!(!is_in_memory("sqlite://data/stream.db?mode=rwc"));
    }

    #[tokio::test]
    async fn test_named_memory_database_uses_one_connection() {
        let backend =
            SqliteBackend::connect("file:test.db?cache=shared&mode=memory", &StorageConfig::default())
                .await
                .unwrap();
        assert_eq!(backend.pool().options().get_max_connections(), 1);

        let table = EventKind::Beacon.table();
        backend.execute(table.create).await.unwrap();
        assert!(backend.prepare(table.insert).await.is_ok());
    }

    #[test]
    fn test_malformed_descriptor_rejected() {
        assert!(connect_options("sqlite://data/stream.db?mode=bogus").is_err());
    }

    #[tokio::test]
    async fn test_prepare_requires_table() {
        let backend = SqliteBackend::connect("sqlite::memory:", &single_connection())
            .await
            .unwrap();
        let table = EventKind::RepoStar.table();

        assert!(backend.prepare(table.insert).await.is_err());

        backend.execute(table.create).await.unwrap();
        let statement = backend.prepare(table.insert).await.unwrap();
        let rows = backend
            .insert(
                &statement,
                vec!["2024-01-01T00:00:00Z".into(), "acme".into(), "widget".into()],
            )
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
