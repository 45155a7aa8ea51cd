//! Database capability used by the gateway.

use async_trait::async_trait;
use sea_query::Value;

/// The operations the gateway needs from a database driver.
///
/// SQL passed in always comes from the table registry, hence `'static`.
///
/// Implementations:
/// - `SqliteBackend`: sqlx SQLite pool
/// - `MockBackend`: in-memory double with failure injection (tests)
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Prepared insert statement, reusable across concurrent inserts.
    type Statement: Send + Sync;

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), sqlx::Error>;

    /// Execute a DDL statement.
    async fn execute(&self, sql: &'static str) -> Result<(), sqlx::Error>;

    /// Prepare an insert template against the live schema.
    async fn prepare(&self, sql: &'static str) -> Result<Self::Statement, sqlx::Error>;

    /// Bind `values` positionally to `statement` and run it.
    ///
    /// Returns the number of rows affected.
    async fn insert(&self, statement: &Self::Statement, values: Vec<Value>)
        -> Result<u64, sqlx::Error>;

    /// Release all connections.
    async fn close(&self);
}
