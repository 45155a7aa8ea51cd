//! Mock backend for testing.
//!
//! Keeps rows in memory, counts DDL and prepare calls per kind, and can be
//! told to fail any step for a given kind.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sea_query::Value;
use tokio::sync::RwLock;

use super::{Backend, EventKind};

/// Statement handle issued by [`MockBackend::prepare`].
#[derive(Debug)]
pub struct MockStatement {
    kind: EventKind,
}

/// In-memory backend with failure injection.
#[derive(Default)]
pub struct MockBackend {
    rows: RwLock<HashMap<EventKind, Vec<Vec<Value>>>>,
    fail_ping: RwLock<bool>,
    fail_create: RwLock<HashSet<EventKind>>,
    fail_prepare: RwLock<HashSet<EventKind>>,
    fail_insert: RwLock<HashSet<EventKind>>,
    init_delay: RwLock<Duration>,
    create_calls: [AtomicUsize; 4],
    prepare_calls: [AtomicUsize; 4],
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_ping(&self, fail: bool) {
        *self.fail_ping.write().await = fail;
    }

    pub async fn set_fail_create(&self, kind: EventKind, fail: bool) {
        toggle(&self.fail_create, kind, fail).await;
    }

    pub async fn set_fail_prepare(&self, kind: EventKind, fail: bool) {
        toggle(&self.fail_prepare, kind, fail).await;
    }

    pub async fn set_fail_insert(&self, kind: EventKind, fail: bool) {
        toggle(&self.fail_insert, kind, fail).await;
    }

    /// Delay applied inside every DDL call, to widen race windows.
    pub async fn set_init_delay(&self, delay: Duration) {
        *self.init_delay.write().await = delay;
    }

    pub fn create_calls(&self, kind: EventKind) -> usize {
        self.create_calls[kind.index()].load(Ordering::SeqCst)
    }

    pub fn prepare_calls(&self, kind: EventKind) -> usize {
        self.prepare_calls[kind.index()].load(Ordering::SeqCst)
    }

    /// Rows inserted for `kind`, in insertion order.
    pub async fn rows(&self, kind: EventKind) -> Vec<Vec<Value>> {
        self.rows
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

async fn toggle(set: &RwLock<HashSet<EventKind>>, kind: EventKind, on: bool) {
    let mut set = set.write().await;
    if on {
        set.insert(kind);
    } else {
        set.remove(&kind);
    }
}

fn injected(kind: EventKind, step: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected {} failure for {}", step, kind))
}

#[async_trait]
impl Backend for MockBackend {
    type Statement = MockStatement;

    async fn ping(&self) -> Result<(), sqlx::Error> {
        if *self.fail_ping.read().await {
            return Err(sqlx::Error::PoolClosed);
        }
        Ok(())
    }

    async fn execute(&self, sql: &'static str) -> Result<(), sqlx::Error> {
        let kind = EventKind::ALL
            .into_iter()
            .find(|k| k.table().create == sql)
            .ok_or_else(|| sqlx::Error::Protocol("unknown DDL".to_string()))?;

        self.create_calls[kind.index()].fetch_add(1, Ordering::SeqCst);

        let delay = *self.init_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_create.read().await.contains(&kind) {
            return Err(injected(kind, "create"));
        }
        Ok(())
    }

    async fn prepare(&self, sql: &'static str) -> Result<Self::Statement, sqlx::Error> {
        let kind = EventKind::ALL
            .into_iter()
            .find(|k| k.table().insert == sql)
            .ok_or_else(|| sqlx::Error::Protocol("unknown insert template".to_string()))?;

        self.prepare_calls[kind.index()].fetch_add(1, Ordering::SeqCst);

        if self.fail_prepare.read().await.contains(&kind) {
            return Err(injected(kind, "prepare"));
        }
        Ok(MockStatement { kind })
    }

    async fn insert(
        &self,
        statement: &Self::Statement,
        values: Vec<Value>,
    ) -> Result<u64, sqlx::Error> {
        let kind = statement.kind;
        let expected = kind.table().arity();
        if values.len() != expected {
            return Err(sqlx::Error::Protocol(format!(
                "expected {} values for {}, got {}",
                expected,
                kind,
                values.len()
            )));
        }
        if self.fail_insert.read().await.contains(&kind) {
            return Err(injected(kind, "insert"));
        }

        self.rows.write().await.entry(kind).or_default().push(values);
        Ok(1)
    }

    async fn close(&self) {}
}
