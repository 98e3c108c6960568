//! SQL dialect implementations for schema translation
//!
//! Each dialect knows how its database spells the abstract column types,
//! the auto-increment primary key construct, identifier quoting and the
//! few DDL statements whose grammar differs between backends.

use crate::adapter::Backend;
use crate::error::{Error, Result};
use crate::operation::Column;

/// Trait for database-specific DDL generation
pub trait SqlDialect: Send + Sync {
    fn backend(&self) -> Backend;

    /// Quote an identifier (table name, column name, index name)
    fn quote_identifier(&self, identifier: &str) -> String;

    /// Generate a parameter placeholder for the given position
    fn placeholder(&self, position: usize) -> String;

    /// Native type keyword for a column that is not auto-incremented
    fn column_type(&self, column: &Column) -> String;

    /// Native type keyword for an auto-increment integer column
    fn serial_type(&self, column: &Column) -> Result<&'static str>;

    /// Primary key clause, folded into the column definition
    fn primary_key_clause(&self, auto_increment: bool) -> &'static str;

    /// Current timestamp expression, used for `NOW()` defaults
    fn current_timestamp(&self) -> &'static str;

    fn boolean_literal(&self, value: bool) -> &'static str;

    /// Whether `CREATE INDEX ... WHERE` is understood
    fn supports_partial_indexes(&self) -> bool;

    /// Whether `ALTER TABLE ADD COLUMN` accepts PRIMARY KEY / UNIQUE columns
    fn supports_constrained_add_column(&self) -> bool {
        true
    }

    /// Whether DDL participates in transactions instead of committing implicitly
    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    /// Drop an index that belongs to `table`
    fn drop_index_sql(&self, table: &str, index: &str) -> String;

    /// `COUNT(*)` of tables named by the first placeholder
    fn table_exists_sql(&self) -> String;
}

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySQLDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SQLiteDialect;

/// Factory function to create the appropriate dialect for a relational backend
pub fn create_dialect(backend: Backend) -> Result<Box<dyn SqlDialect>> {
    match backend {
        Backend::Postgres => Ok(Box::new(PostgresDialect::new())),
        Backend::MySQL => Ok(Box::new(MySQLDialect::new())),
        Backend::SQLite => Ok(Box::new(SQLiteDialect::new())),
        Backend::Document => Err(Error::unsupported(
            "document stores have no SQL dialect".to_string(),
        )),
    }
}

/// Quote with `quote`, leaving qualified `schema.table` names untouched
pub(crate) fn quote_with(identifier: &str, quote: char) -> String {
    if identifier.contains('.') {
        identifier.to_string()
    } else {
        let escaped = identifier.replace(quote, &format!("{}{}", quote, quote));
        format!("{}{}{}", quote, escaped, quote)
    }
}

pub(crate) fn not_auto_incrementable(backend: Backend, column: &Column) -> Error {
    Error::unsupported(format!(
        "autoIncrement on non-primary column '{}' ({})",
        column.name, backend
    ))
}
