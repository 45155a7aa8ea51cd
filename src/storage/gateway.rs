//! Storage gateway.
//!
//! Owns the backend and, per event kind, a lazily prepared insert statement.
//! Each kind moves `Uninitialized -> Ready` exactly once per process; a
//! failed initialization leaves the kind uninitialized so a later request
//! retries it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sea_query::Value;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::{Backend, EventKind, Phase, Result, SqliteBackend, StorageError};
use crate::config::StorageConfig;

/// Observable state of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Uninitialized,
    Ready,
}

/// Initialization state of one kind.
///
/// `attempts` counts finished attempts and only changes while `gate` is
/// held. A caller that sees the count move while it queued on the gate
/// shares that attempt's failure instead of starting another.
struct Slot<S> {
    statement: OnceCell<S>,
    attempts: AtomicU64,
    gate: Mutex<Option<StorageError>>,
}

impl<S> Default for Slot<S> {
    fn default() -> Self {
        Self {
            statement: OnceCell::new(),
            attempts: AtomicU64::new(0),
            gate: Mutex::new(None),
        }
    }
}

/// Shared owner of the database connection and per-kind statements.
///
/// Construct once at startup and share behind an `Arc`.
pub struct Gateway<B: Backend> {
    backend: B,
    slots: [Slot<B::Statement>; 4],
    timeout: Option<Duration>,
}

impl Gateway<SqliteBackend> {
    /// Open the SQLite database named by `config.dsn` and verify it responds.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        if !config.is_enabled() {
            return Err(StorageError::Disabled);
        }

        let backend = SqliteBackend::connect(&config.dsn, config)
            .await
            .map_err(StorageError::Connection)?;

        Self::with_backend(backend, config.statement_timeout()).await
    }
}

impl<B: Backend> Gateway<B> {
    /// Wrap an already connected backend after a liveness check.
    pub async fn with_backend(backend: B, timeout: Option<Duration>) -> Result<Self> {
        backend.ping().await.map_err(StorageError::Connection)?;

        Ok(Self {
            backend,
            slots: Default::default(),
            timeout,
        })
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn readiness(&self, kind: EventKind) -> Readiness {
        if self.slots[kind.index()].statement.initialized() {
            Readiness::Ready
        } else {
            Readiness::Uninitialized
        }
    }

    /// Create the table for `kind` and prepare its insert, once.
    ///
    /// Concurrent callers queue behind a single attempt. If it succeeds they
    /// all return `Ok`; if it fails they all receive its error and the kind
    /// stays uninitialized. Only a call that arrives after the failure
    /// starts a new attempt.
    pub async fn ensure_ready(&self, kind: EventKind) -> Result<()> {
        let slot = &self.slots[kind.index()];
        if slot.statement.initialized() {
            return Ok(());
        }

        let seen = slot.attempts.load(Ordering::SeqCst);
        let mut last_failure = slot.gate.lock().await;

        if slot.statement.initialized() {
            return Ok(());
        }
        if slot.attempts.load(Ordering::SeqCst) != seen {
            if let Some(err) = last_failure.as_ref().and_then(StorageError::replay_init) {
                debug!(kind = %kind, "Sharing result of concurrent init attempt");
                return Err(err);
            }
        }

        let outcome = self.initialize(kind).await;
        slot.attempts.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(statement) => {
                // The gate holder is the only writer.
                let _ = slot.statement.set(statement);
                *last_failure = None;
                Ok(())
            }
            Err(err) => {
                *last_failure = err.replay_init();
                Err(err)
            }
        }
    }

    async fn initialize(&self, kind: EventKind) -> Result<B::Statement> {
        let table = kind.table();

        let statement = self
            .bounded(kind, Phase::Init, async {
                self.backend.execute(table.create).await?;
                self.backend.prepare(table.insert).await
            })
            .await?;

        info!(kind = %kind, table = table.name, "Table ready");
        Ok(statement)
    }

    /// Run the prepared insert for `kind` with `values` in column order.
    ///
    /// [`Gateway::ensure_ready`] must have succeeded for `kind` first.
    pub async fn insert(&self, kind: EventKind, values: Vec<Value>) -> Result<u64> {
        let statement = self.slots[kind.index()]
            .statement
            .get()
            .ok_or(StorageError::NotReady(kind))?;

        debug_assert_eq!(
            values.len(),
            kind.table().arity(),
            "bind count does not match columns of {}",
            kind
        );

        let rows = self
            .bounded(kind, Phase::Insert, self.backend.insert(statement, values))
            .await?;

        debug!(kind = %kind, rows, "Record stored");
        Ok(rows)
    }

    /// Initialize every kind up front.
    ///
    /// Failures are logged and left for lazy retry. Returns how many kinds
    /// are ready afterwards.
    pub async fn warm_up(&self) -> usize {
        let mut ready = 0;
        for kind in EventKind::ALL {
            match self.ensure_ready(kind).await {
                Ok(()) => ready += 1,
                Err(e) => warn!(kind = %kind, error = %e, "Warm-up failed, will retry on demand"),
            }
        }
        ready
    }

    /// Release the backend's connections.
    pub async fn close(&self) {
        self.backend.close().await;
    }

    /// Await a backend call under the configured deadline and attach the
    /// kind and phase to any failure.
    async fn bounded<T, F>(&self, kind: EventKind, phase: Phase, op: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        let outcome = match self.timeout {
            Some(after) => tokio::time::timeout(after, op)
                .await
                .map_err(|_| StorageError::Timeout { kind, phase, after })?,
            None => op.await,
        };

        outcome.map_err(|source| match phase {
            Phase::Init => StorageError::Schema {
                kind,
                source: Arc::new(source),
            },
            Phase::Insert => StorageError::Insert { kind, source },
        })
    }
}
