//! PostgreSQL migration adapter

use crate::adapter::{Backend, DEFAULT_LEDGER_TABLE};
use crate::config::{ConnectionConfig, PoolConfig};
use crate::dialects::PostgresDialect;
use crate::error::Result;
use crate::schema::{SchemaTranslator, Statement};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::sync::Arc;

/// PostgreSQL migration adapter
#[derive(Clone)]
pub struct PostgresAdapter {
    name: String,
    pool: Arc<PgPool>,
    translator: Arc<SchemaTranslator>,
    ledger_table: String,
}

impl PostgresAdapter {
    /// Create a new PostgreSQL adapter
    pub async fn new(name: impl Into<String>, connection_url: &str) -> Result<Self> {
        let pool = PgPool::connect(connection_url).await?;
        Ok(Self::from_pool(name, pool))
    }

    /// Connect using a URL or connection parts
    pub async fn connect_with(
        name: impl Into<String>,
        connection: &ConnectionConfig,
        pool_config: &PoolConfig,
    ) -> Result<Self> {
        let url = connection.to_url(Backend::Postgres)?;
        let pool = PgPoolOptions::new()
            .max_connections(pool_config.max_connections)
            .acquire_timeout(pool_config.connect_timeout())
            .connect(&url)
            .await?;
        Ok(Self::from_pool(name, pool))
    }

    /// Create adapter from existing pool
    pub fn from_pool(name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            name: name.into(),
            pool: Arc::new(pool),
            translator: Arc::new(SchemaTranslator::with_dialect(Box::new(
                PostgresDialect::new(),
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
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl_sqlx_adapter!(PostgresAdapter, PostgresTransaction, Postgres, Backend::Postgres);

impl PostgresTransaction<'_> {
    async fn run(&mut self, statement: Statement) -> Result<()> {
        log::debug!("PostgreSQL DDL: {}", statement.sql);

        sqlx::query(&statement.sql).execute(&mut *self.tx).await?;
        Ok(())
    }
}
