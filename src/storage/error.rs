//! Storage error taxonomy.
//!
//! Every failure that reaches a caller names the event kind and the phase
//! (`init` or `insert`) it happened in, except connection and configuration
//! failures which are not tied to a kind.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tonic::Status;

use super::EventKind;

/// Step of a request's storage path that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Table creation and statement preparation.
    Init,
    /// Execution of the prepared insert.
    Insert,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => f.write_str("init"),
            Phase::Insert => f.write_str("insert"),
        }
    }
}

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Descriptor invalid or backend unreachable.
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// No descriptor configured; storage is switched off.
    #[error("storage disabled: no database descriptor configured")]
    Disabled,

    /// DDL or prepare failed. Shared with every caller that waited on the
    /// same attempt.
    #[error("{kind} init: {source}")]
    Schema {
        kind: EventKind,
        #[source]
        source: Arc<sqlx::Error>,
    },

    #[error("{kind} insert: {source}")]
    Insert {
        kind: EventKind,
        #[source]
        source: sqlx::Error,
    },

    #[error("{kind} {phase}: timed out after {after:?}")]
    Timeout {
        kind: EventKind,
        phase: Phase,
        after: Duration,
    },

    /// Insert attempted before the kind was initialized.
    #[error("{0} insert: table not initialized")]
    NotReady(EventKind),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// Event kind the failure belongs to, if any.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            StorageError::Connection(_) | StorageError::Disabled => None,
            StorageError::Schema { kind, .. }
            | StorageError::Insert { kind, .. }
            | StorageError::Timeout { kind, .. }
            | StorageError::NotReady(kind) => Some(*kind),
        }
    }

    /// Phase the failure happened in, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            StorageError::Connection(_) | StorageError::Disabled => None,
            StorageError::Schema { .. } => Some(Phase::Init),
            StorageError::Timeout { phase, .. } => Some(*phase),
            StorageError::Insert { .. } | StorageError::NotReady(_) => Some(Phase::Insert),
        }
    }

    /// Copy of an initialization failure, handed to callers that queued
    /// behind the attempt that produced it. `None` for any other variant.
    pub(crate) fn replay_init(&self) -> Option<Self> {
        match self {
            StorageError::Schema { kind, source } => Some(StorageError::Schema {
                kind: *kind,
                source: Arc::clone(source),
            }),
            StorageError::Timeout {
                kind,
                phase: Phase::Init,
                after,
            } => Some(StorageError::Timeout {
                kind: *kind,
                phase: Phase::Init,
                after: *after,
            }),
            _ => None,
        }
    }
}

impl From<StorageError> for Status {
    fn from(error: StorageError) -> Self {
        let message = error.to_string();
        match error {
            StorageError::Disabled => Status::failed_precondition(message),
            StorageError::Connection(_) | StorageError::Schema { .. } => {
                Status::unavailable(message)
            }
            StorageError::Timeout { .. } => Status::deadline_exceeded(message),
            StorageError::Insert { .. } | StorageError::NotReady(_) => Status::internal(message),
        }
    }
}
