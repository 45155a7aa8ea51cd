//! Storage layer.
//!
//! - [`schema`]: table registry, one table and insert template per kind
//! - [`Backend`]: database capability (DDL, prepare, insert)
//! - [`Gateway`]: lazy, exactly-once per-kind initialization and inserts

mod backend;
mod error;
mod gateway;
pub mod schema;
mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
mod mock;

pub use backend::Backend;
pub use error::{Phase, Result, StorageError};
pub use gateway::{Gateway, Readiness};
pub use schema::{EventKind, TableSpec};
pub use sqlite::SqliteBackend;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockBackend, MockStatement};
