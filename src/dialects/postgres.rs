//! PostgreSQL dialect
//!
//! Auto-increment primary keys use `SERIAL`; partial indexes are supported
//! and DDL is fully transactional.

use super::{quote_with, SqlDialect};
use crate::adapter::Backend;
use crate::error::Result;
use crate::operation::{Column, ColumnType};

pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for PostgresDialect {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        quote_with(identifier, '"')
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${}", position)
    }

    fn column_type(&self, column: &Column) -> String {
        match column.column_type {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Numeric => match column.length {
                Some(precision) => format!("NUMERIC({})", precision),
                None => "NUMERIC".to_string(),
            },
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::VarChar => format!("VARCHAR({})", column.length.unwrap_or(255)),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn serial_type(&self, _column: &Column) -> Result<&'static str> {
        Ok("SERIAL")
    }

    fn primary_key_clause(&self, _auto_increment: bool) -> &'static str {
        "PRIMARY KEY"
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn supports_partial_indexes(&self) -> bool {
        true
    }

    fn drop_index_sql(&self, _table: &str, index: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(index))
    }

    fn table_exists_sql(&self) -> String {
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = $1"
            .to_string()
    }
}
