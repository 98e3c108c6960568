//! Adapter contract between the migration manager and a backend
//!
//! Every backend exposes the same capability set: ledger management,
//! operation execution and reversion, and transaction scoping. Operations
//! and ledger writes go through an [`AdapterTransaction`] so the DDL of one
//! migration and its ledger row commit or roll back together.

use crate::error::Result;
use crate::operation::Operation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default name of the ledger table/collection
pub const DEFAULT_LEDGER_TABLE: &str = "_migrations";

/// Backend families supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Postgres,
    MySQL,
    SQLite,
    Document,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::MySQL => "mysql",
            Backend::SQLite => "sqlite",
            Backend::Document => "document",
        }
    }

    pub fn is_relational(&self) -> bool {
        !matches!(self, Backend::Document)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger row: a migration id and when it was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigrationRecord {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigrationRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            applied_at: Utc::now(),
        }
    }
}

/// Capability set every backend adapter implements
#[async_trait]
pub trait MigrationAdapter: Send + Sync {
    /// Name of this connection, used in log lines
    fn name(&self) -> &str;

    fn backend(&self) -> Backend;

    /// Create the ledger if it does not exist yet
    async fn ensure_migration_table(&self) -> Result<()>;

    /// Whether the ledger exists, without creating it
    async fn ledger_exists(&self) -> Result<bool>;

    /// Ids of every applied migration, in one round trip
    async fn fetch_applied_ids(&self) -> Result<BTreeSet<String>>;

    /// Open a backend transaction
    async fn begin<'a>(&'a self) -> Result<Box<dyn AdapterTransaction + 'a>>;
}

/// Work performed inside one backend transaction
#[async_trait]
pub trait AdapterTransaction: Send {
    async fn execute_operation(&mut self, op: &Operation) -> Result<()>;

    /// Undo `op`; dropping an index that is already gone is not an error
    async fn revert_operation(&mut self, op: &Operation) -> Result<()>;

    async fn record_applied_migration(&mut self, id: &str) -> Result<()>;

    async fn record_rolled_back_migration(&mut self, id: &str) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Run `body` inside a transaction on `adapter`
///
/// Commits when the body returns `Ok`. On `Err` the transaction is rolled
/// back and the body's error is returned; a failed rollback is logged but
/// never replaces the original error.
pub async fn transaction<'a, A, T, F>(adapter: &'a A, body: F) -> Result<T>
where
    A: MigrationAdapter + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut (dyn AdapterTransaction + 'a)) -> BoxFuture<'t, Result<T>> + Send,
{
    let mut tx = adapter.begin().await?;
    match body(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                log::error!(
                    "[{}] rollback failed after error '{}': {}",
                    adapter.name(),
                    e,
                    rollback_err
                );
            }
            Err(e)
        }
    }
}
