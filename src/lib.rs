//! RustF Migrations - declarative schema migrations
//!
//! Schema changes are described once, as [`Operation`] values grouped into
//! versioned [`Migration`]s, and translated per backend:
//! - PostgreSQL, MySQL and SQLite through sqlx, with dialect-specific DDL
//! - Document stores through the [`DocumentClient`] contract
//! - A ledger table/collection records which migration ids are applied
//!
//! ```no_run
//! use rustf_migrations::prelude::*;
//!
//! # async fn run() -> rustf_migrations::Result<()> {
//! let users = Migration::new(
//!     "001",
//!     "create users",
//!     vec![Operation::create_table("users")
//!         .add_primary("id")
//!         .add_var_char("name", 50, ColumnOptions::new().required())
//!         .add_timestamps()
//!         .finalize()],
//!     vec![Operation::create_table("users").finalize()],
//! );
//!
//! let adapter = AnyAdapter::connect("main", "sqlite://app.db").await?;
//! let mut manager = MigrationManager::new(adapter, vec![users])?;
//! manager.migrate_up().await?;
//! println!("{}", manager.status().await?);
//! # Ok(())
//! # }
//! ```

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod dialects;
pub mod document;
pub mod error;
pub mod manager;
pub mod migration;
pub mod operation;
pub mod schema;

// Re-export main types for public API
pub use adapter::{
    transaction, AdapterTransaction, AppliedMigrationRecord, Backend, MigrationAdapter,
    DEFAULT_LEDGER_TABLE,
};
pub use adapters::{AnyAdapter, DocumentStoreAdapter, MySqlAdapter, PostgresAdapter, SqliteAdapter};
pub use config::{ConnectionConfig, ConnectionParts, MigrationConfig, PoolConfig};
pub use document::{DocumentClient, DocumentSession, IndexModel, MemoryDocumentClient};
pub use error::{Error, Result};
pub use manager::{MigrationManager, MigrationReport, StatusEntry, StatusReport};
pub use migration::{load_migrations, validate_migrations, Migration, ValidationResult};
pub use operation::{
    Column, ColumnOptions, ColumnType, Index, IndexColumn, IndexOptions, Operation,
    OperationBuilder, OperationKind, SortOrder,
};

/// Everything needed to declare and run migrations
pub mod prelude {
    pub use crate::adapter::MigrationAdapter;
    pub use crate::adapters::{AnyAdapter, DocumentStoreAdapter};
    pub use crate::error::{Error, Result};
    pub use crate::manager::MigrationManager;
    pub use crate::migration::Migration;
    pub use crate::operation::{ColumnOptions, IndexOptions, Operation};
}
