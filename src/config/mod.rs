//! Application configuration.
//!
//! Aggregates server, storage and transport settings into a single Config
//! struct that can be loaded from YAML files or environment variables.

mod server;
mod storage;

pub use server::ServerConfig;
pub use storage::{StorageConfig, EXAMPLE_MEMORY_DSN};

use serde::Deserialize;

use crate::transport::TransportConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "STREAM_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "STREAM";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "STREAM_LOG";
/// Environment variable for database URL, used when `storage.dsn` is unset.
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Transport configuration.
    pub transport: TransportConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    ///    (e.g. `STREAM__STORAGE__DSN`)
    ///
    /// `DATABASE_URL` fills in `storage.dsn` only when no source set it.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = config.try_deserialize()?;

        if !config.storage.is_enabled() {
            if let Ok(url) = std::env::var(DATABASE_URL_ENV_VAR) {
                config.storage.dsn = url;
            }
        }

        Ok(config)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self {
            storage: StorageConfig::with_dsn(EXAMPLE_MEMORY_DSN),
            ..Self::default()
        }
    }
}
