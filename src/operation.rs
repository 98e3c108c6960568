//! Declarative schema operations
//!
//! An [`Operation`] describes one unit of schema change: a table name, the
//! columns it carries and the indexes to build over them. Operations are
//! plain data; adapters translate them into native DDL or index calls.
//!
//! ```
//! use rustf_migrations::operation::{ColumnOptions, IndexOptions, Operation};
//!
//! let users = Operation::create_table("users")
//!     .add_primary("id")
//!     .add_var_char("email", 120, ColumnOptions::new().required().unique())
//!     .add_timestamps()
//!     .add_index("users_email_idx", &["email DESC"], IndexOptions::default())
//!     .finalize();
//!
//! assert_eq!(users.columns().len(), 4);
//! assert_eq!(users.indexes().len(), 2);
//! ```

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Sentinel default resolved to the backend's current-timestamp expression
pub const NOW: &str = "NOW()";

/// Abstract column types understood by every adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    Integer,
    Numeric,
    Boolean,
    VarChar,
    Date,
    Time,
    Timestamp,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::VarChar => "VARCHAR",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_uppercase().as_str() {
            "INTEGER" => Ok(ColumnType::Integer),
            "NUMERIC" => Ok(ColumnType::Numeric),
            "BOOLEAN" => Ok(ColumnType::Boolean),
            "VARCHAR" | "STRING" => Ok(ColumnType::VarChar),
            "DATE" => Ok(ColumnType::Date),
            "TIME" => Ok(ColumnType::Time),
            "TIMESTAMP" => Ok(ColumnType::Timestamp),
            _ => Err(Error::unsupported(format!("column type '{}'", token))),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = Error;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        token.parse()
    }
}

impl From<ColumnType> for String {
    fn from(column_type: ColumnType) -> Self {
        column_type.as_str().to_string()
    }
}

/// Sort direction of one index column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Direction used by document-store index keys
    pub fn direction(&self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// What an operation does to its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OperationKind {
    /// Create the table with its columns, then its indexes
    #[default]
    CreateTable,
    /// Add columns and indexes to an existing table
    AlterTable,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateTable => "createTable",
            OperationKind::AlterTable => "alterTable",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim() {
            "createTable" => Ok(OperationKind::CreateTable),
            "alterTable" => Ok(OperationKind::AlterTable),
            _ => Err(Error::unsupported(format!("operation kind '{}'", token))),
        }
    }
}

impl TryFrom<String> for OperationKind {
    type Error = Error;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        token.parse()
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub auto_increment: bool,
    /// `None` emits no DEFAULT clause, `Some(Null)` emits `DEFAULT NULL`
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<JsonValue>,
}

// Keeps an explicit `"default": null` distinct from a missing key.
fn present_value<'de, D>(deserializer: D) -> Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
            required: false,
            unique: false,
            primary: false,
            auto_increment: false,
            default: None,
        }
    }

    fn with_options(name: &str, column_type: ColumnType, options: ColumnOptions) -> Self {
        Self {
            length: options.length,
            required: options.required,
            unique: options.unique,
            default: options.default,
            ..Self::new(name, column_type)
        }
    }

    /// True when the default is the current-timestamp sentinel
    pub fn defaults_to_now(&self) -> bool {
        matches!(&self.default, Some(JsonValue::String(s)) if s.eq_ignore_ascii_case(NOW))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
    /// Partial-index predicate, honored only where the backend supports it
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

/// Options shared by the typed `add_*` column methods
#[derive(Debug, Clone, Default)]
pub struct ColumnOptions {
    pub length: Option<u32>,
    pub required: bool,
    pub unique: bool,
    pub default: Option<JsonValue>,
}

impl ColumnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn default_value(mut self, value: impl Into<JsonValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn default_null(mut self) -> Self {
        self.default = Some(JsonValue::Null);
        self
    }

    pub fn default_now(self) -> Self {
        self.default_value(NOW)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub unique: bool,
    pub predicate: Option<String>,
}

impl IndexOptions {
    pub fn unique() -> Self {
        Self {
            unique: true,
            predicate: None,
        }
    }

    pub fn filtered(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

/// Name of the synthetic index generated for a primary column
pub fn primary_index_name(table: &str, column: &str) -> String {
    format!("{}_{}_pk", table, column)
}

/// Parse an index column token such as `"created_at DESC"`
///
/// A trailing ` DESC` (any case) selects descending order; everything else
/// is ascending.
pub fn parse_index_column(token: &str) -> IndexColumn {
    let trimmed = token.trim();
    let split = trimmed.len().saturating_sub(5);
    match (trimmed.get(..split), trimmed.get(split..)) {
        (Some(name), Some(suffix)) if suffix.eq_ignore_ascii_case(" desc") => IndexColumn {
            name: name.trim_end().to_string(),
            order: SortOrder::Desc,
        },
        _ => IndexColumn {
            name: trimmed.to_string(),
            order: SortOrder::Asc,
        },
    }
}

/// One declarative schema change, consumed read-only by adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    kind: OperationKind,
    table_name: String,
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    indexes: Vec<Index>,
}

impl Operation {
    /// Start building an operation that creates `table_name`
    pub fn create_table(table_name: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(OperationKind::CreateTable, table_name.into())
    }

    /// Start building an operation that extends an existing `table_name`
    pub fn alter_table(table_name: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(OperationKind::AlterTable, table_name.into())
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Indexes that must be emitted separately (primary indexes live on the column)
    pub fn secondary_indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter().filter(|index| !index.primary)
    }
}

/// Fluent builder for [`Operation`]
///
/// No validation happens here; malformed combinations surface when an
/// adapter translates the finalized operation.
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    operation: Operation,
}

impl OperationBuilder {
    fn new(kind: OperationKind, table_name: String) -> Self {
        Self {
            operation: Operation {
                kind,
                table_name,
                columns: Vec::new(),
                indexes: Vec::new(),
            },
        }
    }

    /// Add an arbitrary column
    ///
    /// A primary column is forced to required + unique and gets its
    /// synthetic `{table}_{column}_pk` index.
    pub fn add_column(mut self, mut column: Column) -> Self {
        if column.primary {
            column.required = true;
            column.unique = true;
            let name = primary_index_name(&self.operation.table_name, &column.name);
            self.operation.indexes.push(Index {
                name,
                columns: vec![IndexColumn {
                    name: column.name.clone(),
                    order: SortOrder::Asc,
                }],
                unique: true,
                primary: true,
                predicate: None,
            });
        }
        self.operation.columns.push(column);
        self
    }

    pub fn add_integer(self, name: &str, options: ColumnOptions) -> Self {
        self.add_column(Column::with_options(name, ColumnType::Integer, options))
    }

    pub fn add_numeric(self, name: &str, options: ColumnOptions) -> Self {
        self.add_column(Column::with_options(name, ColumnType::Numeric, options))
    }

    pub fn add_var_char(self, name: &str, length: u32, options: ColumnOptions) -> Self {
        self.add_column(Column::with_options(
            name,
            ColumnType::VarChar,
            options.length(length),
        ))
    }

    /// Alias of [`add_var_char`](Self::add_var_char)
    pub fn add_string(self, name: &str, length: u32, options: ColumnOptions) -> Self {
        self.add_var_char(name, length, options)
    }

    pub fn add_boolean(self, name: &str, options: ColumnOptions) -> Self {
        self.add_column(Column::with_options(name, ColumnType::Boolean, options))
    }

    pub fn add_date(self, name: &str, options: ColumnOptions) -> Self {
        self.add_column(Column::with_options(name, ColumnType::Date, options))
    }

    pub fn add_time(self, name: &str, options: ColumnOptions) -> Self {
        self.add_column(Column::with_options(name, ColumnType::Time, options))
    }

    pub fn add_timestamp(self, name: &str, options: ColumnOptions) -> Self {
        self.add_column(Column::with_options(name, ColumnType::Timestamp, options))
    }

    /// Append `created_at` (required, defaults to now) then `updated_at` (nullable)
    pub fn add_timestamps(self) -> Self {
        self.add_timestamp("created_at", ColumnOptions::new().required().default_now())
            .add_timestamp("updated_at", ColumnOptions::new().default_null())
    }

    /// Add an auto-increment integer primary key
    pub fn add_primary(self, name: &str) -> Self {
        let mut column = Column::new(name, ColumnType::Integer);
        column.primary = true;
        column.auto_increment = true;
        self.add_column(column)
    }

    /// Add an index over `columns`; a token ending in ` DESC` sorts descending
    pub fn add_index(mut self, name: &str, columns: &[&str], options: IndexOptions) -> Self {
        self.operation.indexes.push(Index {
            name: name.to_string(),
            columns: columns.iter().map(|c| parse_index_column(c)).collect(),
            unique: options.unique,
            primary: false,
            predicate: options.predicate,
        });
        self
    }

    /// Produce the immutable descriptor
    pub fn finalize(self) -> Operation {
        self.operation
    }
}
