//! SQLite dialect

use super::{not_auto_incrementable, quote_with, SqlDialect};
use crate::adapter::Backend;
use crate::error::Result;
use crate::operation::{Column, ColumnType};

pub struct SQLiteDialect;

impl SQLiteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SQLiteDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for SQLiteDialect {
    fn backend(&self) -> Backend {
        Backend::SQLite
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        quote_with(identifier, '"')
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn column_type(&self, column: &Column) -> String {
        match column.column_type {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Numeric => "NUMERIC".to_string(),
            // SQLite has no boolean storage class
            ColumnType::Boolean => "INTEGER".to_string(),
            ColumnType::VarChar => match column.length {
                Some(length) => format!("VARCHAR({})", length),
                None => "TEXT".to_string(),
            },
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn serial_type(&self, column: &Column) -> Result<&'static str> {
        if !column.primary {
            return Err(not_auto_incrementable(self.backend(), column));
        }
        Ok("INTEGER")
    }

    fn primary_key_clause(&self, auto_increment: bool) -> &'static str {
        if auto_increment {
            "PRIMARY KEY AUTOINCREMENT"
        } else {
            "PRIMARY KEY"
        }
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn supports_partial_indexes(&self) -> bool {
        true
    }

    fn supports_constrained_add_column(&self) -> bool {
        false
    }

    fn drop_index_sql(&self, _table: &str, index: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(index))
    }

    fn table_exists_sql(&self) -> String {
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?".to_string()
    }
}
