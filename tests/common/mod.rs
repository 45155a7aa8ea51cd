//! Shared utilities for integration tests.
//!
//! Opens gateways on throwaway SQLite files and reads rows back with
//! sea-query selects.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use sea_query::{Iden, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;

use stream::config::StorageConfig;
use stream::storage::{Gateway, SqliteBackend};

/// HTTP access log table.
#[derive(Iden)]
pub enum Http {
    Table,
    Timestamp,
    Method,
    Domain,
    Path,
    Remote,
    UserAgent,
    Referrer,
}

/// CSP violation table.
#[derive(Iden)]
pub enum Csp {
    Table,
    Timestamp,
    Remote,
    UserAgent,
    Referrer,
    Enforce,
    BlockedUri,
    SourceFile,
    DocumentUri,
    ViolatedDirective,
    EffectiveDirective,
    LineNumber,
    StatusCode,
}

/// Navigation beacon table.
#[derive(Iden)]
pub enum Beacon {
    Table,
    DurationMs,
    SrcPage,
    DstPage,
    Remote,
    UserAgent,
    Referrer,
}

/// Repository star table.
#[derive(Iden)]
pub enum Repo {
    Table,
    Timestamp,
    Owner,
    Repo,
}

/// Descriptor for a database file inside `dir`.
pub fn file_dsn(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("stream.db").display())
}

/// Open a gateway on a fresh database file inside `dir`.
pub async fn open_gateway(dir: &Path) -> Arc<Gateway<SqliteBackend>> {
    let config = StorageConfig::with_dsn(file_dsn(dir));
    Arc::new(Gateway::open(&config).await.expect("Failed to open gateway"))
}

/// Fetch every row of `table`, selecting `columns` in order.
pub async fn fetch_all<T, C, I>(pool: &SqlitePool, table: T, columns: I) -> Vec<SqliteRow>
where
    T: Iden + 'static,
    C: Iden + 'static,
    I: IntoIterator<Item = C>,
{
    let query = Query::select()
        .columns(columns)
        .from(table)
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query)
        .fetch_all(pool)
        .await
        .expect("Failed to read rows")
}

/// Count rows in `table`.
pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

/// Number of tables named `table` in the schema.
pub async fn table_count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(table)
        .fetch_one(pool)
        .await
        .expect("Failed to inspect schema")
}
