//! SQLite migration adapter

use crate::adapter::{Backend, DEFAULT_LEDGER_TABLE};
use crate::config::{ConnectionConfig, PoolConfig};
use crate::dialects::SQLiteDialect;
use crate::error::Result;
use crate::schema::{SchemaTranslator, Statement};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// SQLite migration adapter
#[derive(Clone)]
pub struct SqliteAdapter {
    name: String,
    pool: Arc<SqlitePool>,
    translator: Arc<SchemaTranslator>,
    ledger_table: String,
}

impl SqliteAdapter {
    /// Create a new SQLite adapter, creating the database file if needed
    pub async fn new(name: impl Into<String>, connection_url: &str) -> Result<Self> {
        Self::connect_with(
            name,
            &ConnectionConfig::url(connection_url),
            &PoolConfig::default(),
        )
        .await
    }

    /// Connect using a URL or connection parts
    pub async fn connect_with(
        name: impl Into<String>,
        connection: &ConnectionConfig,
        pool_config: &PoolConfig,
    ) -> Result<Self> {
        let url = connection.to_url(Backend::SQLite)?;
        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
        // every connection to :memory: opens a separate database
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            pool_config.max_connections
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(pool_config.connect_timeout())
            .connect_with(options)
            .await?;
        Ok(Self::from_pool(name, pool))
    }

    /// Create adapter from existing pool
    pub fn from_pool(name: impl Into<String>, pool: SqlitePool) -> Self {
        Self {
            name: name.into(),
            pool: Arc::new(pool),
            translator: Arc::new(SchemaTranslator::with_dialect(Box::new(
                SQLiteDialect::new(),
            ))),
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }

    /// Use a ledger table other than `_migrations`
    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = table.into();
        self
    }

    /// Get reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl_sqlx_adapter!(SqliteAdapter, SqliteTransaction, Sqlite, Backend::SQLite);

impl SqliteTransaction<'_> {
    async fn run(&mut self, statement: Statement) -> Result<()> {
        log::debug!("SQLite DDL: {}", statement.sql);

        sqlx::query(&statement.sql).execute(&mut *self.tx).await?;
        Ok(())
    }
}
