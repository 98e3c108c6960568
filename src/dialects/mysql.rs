//! MySQL/MariaDB dialect
//!
//! MySQL has no partial indexes and commits DDL implicitly, so a failing
//! migration cannot undo statements that already ran.

use super::{not_auto_incrementable, quote_with, SqlDialect};
use crate::adapter::Backend;
use crate::error::Result;
use crate::operation::{Column, ColumnType};

pub struct MySQLDialect;

impl MySQLDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MySQLDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for MySQLDialect {
    fn backend(&self) -> Backend {
        Backend::MySQL
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        quote_with(identifier, '`')
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn column_type(&self, column: &Column) -> String {
        match column.column_type {
            ColumnType::Integer => "INT".to_string(),
            ColumnType::Numeric => match column.length {
                Some(precision) => format!("DECIMAL({})", precision),
                None => "DECIMAL".to_string(),
            },
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::VarChar => format!("VARCHAR({})", column.length.unwrap_or(255)),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "DATETIME".to_string(),
        }
    }

    fn serial_type(&self, column: &Column) -> Result<&'static str> {
        if !column.primary {
            return Err(not_auto_incrementable(self.backend(), column));
        }
        Ok("INT")
    }

    fn primary_key_clause(&self, auto_increment: bool) -> &'static str {
        if auto_increment {
            "AUTO_INCREMENT PRIMARY KEY"
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
        false
    }

    fn supports_transactional_ddl(&self) -> bool {
        false
    }

    fn drop_index_sql(&self, table: &str, index: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(index),
            self.quote_identifier(table)
        )
    }

    fn table_exists_sql(&self) -> String {
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_name = ?"
            .to_string()
    }
}
