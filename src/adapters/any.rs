//! Adapter selection by connection URL scheme

use crate::adapter::{Backend, MigrationAdapter};
use crate::adapters::{MySqlAdapter, PostgresAdapter, SqliteAdapter};
use crate::config::MigrationConfig;
use crate::error::{Error, Result};

/// Factory for relational adapters
///
/// Document stores are not reachable through a URL alone; build a
/// [`DocumentStoreAdapter`](crate::adapters::DocumentStoreAdapter) from a
/// client instead.
pub struct AnyAdapter;

impl AnyAdapter {
    /// Connect using only a URL and default settings
    pub async fn connect(
        name: impl Into<String>,
        connection_url: &str,
    ) -> Result<Box<dyn MigrationAdapter>> {
        Self::connect_with(name, &MigrationConfig::new(connection_url)).await
    }

    /// Connect using a full config, picking the backend from the URL scheme
    pub async fn connect_with(
        name: impl Into<String>,
        config: &MigrationConfig,
    ) -> Result<Box<dyn MigrationAdapter>> {
        let backend = config.connection.backend()?;
        Self::connect_backend(name, backend, config).await
    }

    /// Connect to an explicitly named backend
    ///
    /// Needed when the connection is given as parts rather than a URL.
    pub async fn connect_backend(
        name: impl Into<String>,
        backend: Backend,
        config: &MigrationConfig,
    ) -> Result<Box<dyn MigrationAdapter>> {
        let name = name.into();
        log::debug!("[{}] connecting {} migration adapter", name, backend);

        let adapter: Box<dyn MigrationAdapter> = match backend {
            Backend::Postgres => Box::new(
                PostgresAdapter::connect_with(name, &config.connection, &config.pool)
                    .await?
                    .with_ledger_table(&config.ledger_table),
            ),
            Backend::MySQL => Box::new(
                MySqlAdapter::connect_with(name, &config.connection, &config.pool)
                    .await?
                    .with_ledger_table(&config.ledger_table),
            ),
            Backend::SQLite => Box::new(
                SqliteAdapter::connect_with(name, &config.connection, &config.pool)
                    .await?
                    .with_ledger_table(&config.ledger_table),
            ),
            Backend::Document => {
                return Err(Error::configuration(
                    "document stores need a client; construct DocumentStoreAdapter directly",
                ))
            }
        };

        Ok(adapter)
    }
}
