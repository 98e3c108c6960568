//! MySQL/MariaDB migration adapter
//!
//! MySQL commits DDL implicitly, so a migration that fails partway keeps
//! the statements that already ran; only its ledger row is rolled back.

use crate::adapter::{Backend, DEFAULT_LEDGER_TABLE};
use crate::config::{ConnectionConfig, PoolConfig};
use crate::dialects::MySQLDialect;
use crate::error::Result;
use crate::schema::{SchemaTranslator, Statement, StatementKind};
use sqlx::mysql::{MySqlDatabaseError, MySqlPoolOptions};
use sqlx::{MySql, MySqlPool};
use std::sync::Arc;

/// `ER_CANT_DROP_FIELD_OR_KEY`
const ER_CANT_DROP_FIELD_OR_KEY: u16 = 1091;

/// MySQL migration adapter
#[derive(Clone)]
pub struct MySqlAdapter {
    name: String,
    pool: Arc<MySqlPool>,
    translator: Arc<SchemaTranslator>,
    ledger_table: String,
}

impl MySqlAdapter {
    /// Create a new MySQL adapter
    pub async fn new(name: impl Into<String>, connection_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(connection_url).await?;
        Ok(Self::from_pool(name, pool))
    }

    /// Connect using a URL or connection parts
    pub async fn connect_with(
        name: impl Into<String>,
        connection: &ConnectionConfig,
        pool_config: &PoolConfig,
    ) -> Result<Self> {
        let url = connection.to_url(Backend::MySQL)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(pool_config.max_connections)
            .acquire_timeout(pool_config.connect_timeout())
            .connect(&url)
            .await?;
        Ok(Self::from_pool(name, pool))
    }

    /// Create adapter from existing pool
    pub fn from_pool(name: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            name: name.into(),
            pool: Arc::new(pool),
            translator: Arc::new(SchemaTranslator::with_dialect(Box::new(
                MySQLDialect::new(),
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
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl_sqlx_adapter!(MySqlAdapter, MySqlTransaction, MySql, Backend::MySQL);

impl MySqlTransaction<'_> {
    async fn run(&mut self, statement: Statement) -> Result<()> {
        log::debug!("MySQL DDL: {}", statement.sql);

        match sqlx::query(&statement.sql).execute(&mut *self.tx).await {
            Ok(_) => Ok(()),
            Err(e) if should_swallow(statement.kind, mysql_error_number(&e)) => {
                log::warn!("[{}] index already gone: {}", self.adapter.name, e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Only a missing index on an index drop is tolerated
fn should_swallow(kind: StatementKind, error_number: Option<u16>) -> bool {
    kind == StatementKind::DropIndex && error_number == Some(ER_CANT_DROP_FIELD_OR_KEY)
}

fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| e.number()),
        _ => None,
    }
}
