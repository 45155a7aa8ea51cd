//! Storage configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Example descriptor for a throwaway in-memory database.
pub const EXAMPLE_MEMORY_DSN: &str = "sqlite::memory:";

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite connection descriptor. Empty disables storage; every request
    /// then fails with a configuration error.
    pub dsn: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Deadline for each schema or insert call, in milliseconds.
    pub statement_timeout_ms: Option<u64>,
    /// Create every table at startup instead of on first use.
    pub eager_init: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_connections: 5,
            statement_timeout_ms: None,
            eager_init: false,
        }
    }
}

impl StorageConfig {
    /// Config for the given descriptor with all other settings defaulted.
    pub fn with_dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.dsn.trim().is_empty()
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }
}
