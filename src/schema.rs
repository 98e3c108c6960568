//! Translation of operations into dialect-specific DDL
//!
//! The shape is shared by every relational backend: each column becomes
//! `name TYPE [NOT NULL] [PRIMARY KEY | UNIQUE] [DEFAULT x]`, secondary
//! indexes become separate `CREATE INDEX` statements, and the primary index
//! stays folded into its column definition.

use crate::adapter::Backend;
use crate::dialects::{create_dialect, SqlDialect};
use crate::error::{Error, Result};
use crate::operation::{Column, ColumnType, Index, Operation, OperationKind};
use serde_json::Value as JsonValue;

/// How the adapter should treat a failure of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Any error is propagated
    Ddl,
    /// A missing index is not an error
    DropIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub kind: StatementKind,
}

impl Statement {
    fn ddl(sql: String) -> Self {
        Self {
            sql,
            kind: StatementKind::Ddl,
        }
    }

    fn drop_index(sql: String) -> Self {
        Self {
            sql,
            kind: StatementKind::DropIndex,
        }
    }
}

/// Schema translator that generates dialect-specific DDL
pub struct SchemaTranslator {
    dialect: Box<dyn SqlDialect>,
}

impl SchemaTranslator {
    pub fn new(backend: Backend) -> Result<Self> {
        Ok(Self {
            dialect: create_dialect(backend)?,
        })
    }

    pub fn with_dialect(dialect: Box<dyn SqlDialect>) -> Self {
        Self { dialect }
    }

    pub fn backend(&self) -> Backend {
        self.dialect.backend()
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// Statements that apply `op`, in execution order
    pub fn execute_statements(&self, op: &Operation) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();

        match op.kind() {
            OperationKind::CreateTable => {
                statements.push(Statement::ddl(self.create_table_sql(op, false)?));
            }
            OperationKind::AlterTable => {
                for column in op.columns() {
                    statements.push(Statement::ddl(self.add_column_sql(op, column)?));
                }
            }
        }

        for index in op.secondary_indexes() {
            statements.push(Statement::ddl(self.create_index_sql(op.table_name(), index)?));
        }

        Ok(statements)
    }

    /// Statements that undo `op`, in execution order
    pub fn revert_statements(&self, op: &Operation) -> Result<Vec<Statement>> {
        let table = op.table_name();
        let mut statements: Vec<Statement> = op
            .secondary_indexes()
            .map(|index| Statement::drop_index(self.dialect.drop_index_sql(table, &index.name)))
            .collect();

        match op.kind() {
            OperationKind::CreateTable => {
                statements.push(Statement::ddl(format!(
                    "DROP TABLE {}",
                    self.dialect.quote_identifier(table)
                )));
            }
            OperationKind::AlterTable => {
                for column in op.columns().iter().rev() {
                    statements.push(Statement::ddl(format!(
                        "ALTER TABLE {} DROP COLUMN {}",
                        self.dialect.quote_identifier(table),
                        self.dialect.quote_identifier(&column.name)
                    )));
                }
            }
        }

        Ok(statements)
    }

    fn create_table_sql(&self, op: &Operation, if_not_exists: bool) -> Result<String> {
        let column_defs = op
            .columns()
            .iter()
            .map(|column| {
                self.column_definition(op.table_name(), column)
                    .map(|def| format!("  {}", def))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "CREATE TABLE {}{} (\n{}\n)",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.dialect.quote_identifier(op.table_name()),
            column_defs.join(",\n")
        ))
    }

    fn add_column_sql(&self, op: &Operation, column: &Column) -> Result<String> {
        if (column.primary || column.unique) && !self.dialect.supports_constrained_add_column() {
            return Err(Error::unsupported(format!(
                "{} of constrained column '{}.{}' ({})",
                op.kind(),
                op.table_name(),
                column.name,
                self.backend()
            )));
        }

        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.dialect.quote_identifier(op.table_name()),
            self.column_definition(op.table_name(), column)?
        ))
    }

    /// `name TYPE [NOT NULL] [PRIMARY KEY | UNIQUE] [DEFAULT x]`
    pub fn column_definition(&self, table: &str, column: &Column) -> Result<String> {
        let data_type = if column.auto_increment {
            if column.column_type != ColumnType::Integer {
                return Err(Error::unsupported(format!(
                    "autoIncrement on {} column '{}.{}'",
                    column.column_type, table, column.name
                )));
            }
            self.dialect.serial_type(column)?.to_string()
        } else {
            self.dialect.column_type(column)
        };

        let mut def = format!("{} {}", self.dialect.quote_identifier(&column.name), data_type);

        if column.required || column.primary {
            def.push_str(" NOT NULL");
        }

        if column.primary {
            def.push(' ');
            def.push_str(self.dialect.primary_key_clause(column.auto_increment));
        } else if column.unique {
            def.push_str(" UNIQUE");
        }

        if let Some(default) = &column.default {
            def.push_str(" DEFAULT ");
            def.push_str(&self.default_literal(table, column, default)?);
        }

        Ok(def)
    }

    fn default_literal(&self, table: &str, column: &Column, value: &JsonValue) -> Result<String> {
        match value {
            JsonValue::Null => Ok("NULL".to_string()),
            JsonValue::Bool(b) => Ok(self.dialect.boolean_literal(*b).to_string()),
            JsonValue::Number(n) => Ok(n.to_string()),
            JsonValue::String(_) if column.defaults_to_now() => {
                Ok(self.dialect.current_timestamp().to_string())
            }
            JsonValue::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
            JsonValue::Array(_) | JsonValue::Object(_) => Err(Error::unsupported(format!(
                "structured default value for column '{}.{}'",
                table, column.name
            ))),
        }
    }

    pub fn create_index_sql(&self, table: &str, index: &Index) -> Result<String> {
        if index.columns.is_empty() {
            return Err(Error::unsupported(format!(
                "index '{}' without columns",
                index.name
            )));
        }

        let columns = index
            .columns
            .iter()
            .map(|c| {
                format!(
                    "{} {}",
                    self.dialect.quote_identifier(&c.name),
                    c.order.as_sql()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.dialect.quote_identifier(&index.name),
            self.dialect.quote_identifier(table),
            columns
        );

        if let Some(predicate) = &index.predicate {
            if !self.dialect.supports_partial_indexes() {
                return Err(Error::unsupported(format!(
                    "partial index '{}' ({} has no filtered indexes)",
                    index.name,
                    self.backend()
                )));
            }
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }

        Ok(sql)
    }

    /// Create-if-absent DDL for the ledger table
    pub fn ledger_table_sql(&self, table: &str) -> Result<String> {
        let mut id = Column::new("id", ColumnType::VarChar);
        id.length = Some(255);
        id.primary = true;

        let mut applied_at = Column::new("applied_at", ColumnType::Timestamp);
        applied_at.required = true;
        applied_at.default = Some(JsonValue::String(crate::operation::NOW.to_string()));

        let ledger = Operation::create_table(table)
            .add_column(id)
            .add_column(applied_at)
            .finalize();
        self.create_table_sql(&ledger, true)
    }

    pub fn select_applied_ids_sql(&self, table: &str) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY {}",
            self.dialect.quote_identifier("id"),
            self.dialect.quote_identifier(table),
            self.dialect.quote_identifier("id")
        )
    }

    pub fn insert_applied_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote_identifier(table),
            self.dialect.quote_identifier("id"),
            self.dialect.placeholder(1)
        )
    }

    pub fn delete_applied_sql(&self, table: &str) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {}",
            self.dialect.quote_identifier(table),
            self.dialect.quote_identifier("id"),
            self.dialect.placeholder(1)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{ColumnOptions, IndexOptions};

    fn translator(backend: Backend) -> SchemaTranslator {
        SchemaTranslator::new(backend).unwrap()
    }

    fn users() -> Operation {
        Operation::create_table("t")
            .add_primary("id")
            .add_var_char("name", 50, ColumnOptions::new().required())
            .finalize()
    }

    #[test]
    fn test_postgres_create_table() {
        let statements = translator(Backend::Postgres).execute_statements(&users()).unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].sql,
            "CREATE TABLE \"t\" (\n  \"id\" SERIAL NOT NULL PRIMARY KEY,\n  \"name\" VARCHAR(50) NOT NULL\n)"
        );
    }

    #[test]
    fn test_mysql_create_table() {
        let statements = translator(Backend::MySQL).execute_statements(&users()).unwrap();
        assert_eq!(
            statements[0].sql,
            "CREATE TABLE `t` (\n  `id` INT NOT NULL AUTO_INCREMENT PRIMARY KEY,\n  `name` VARCHAR(50) NOT NULL\n)"
        );
    }

    #[test]
    fn test_sqlite_create_table() {
        let statements = translator(Backend::SQLite).execute_statements(&users()).unwrap();
        assert_eq!(
            statements[0].sql,
            "CREATE TABLE \"t\" (\n  \"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,\n  \"name\" VARCHAR(50) NOT NULL\n)"
        );
    }

    #[test]
    fn test_modifier_order_and_defaults() {
        let t = translator(Backend::Postgres);
        let op = Operation::create_table("flags")
            .add_boolean("enabled", ColumnOptions::new().required().unique().default_value(true))
            .add_var_char("label", 20, ColumnOptions::new().default_value("it's"))
            .add_integer("rank", ColumnOptions::new().default_value(3))
            .add_timestamps()
            .finalize();

        let columns: Vec<String> = op
            .columns()
            .iter()
            .map(|c| t.column_definition("flags", c).unwrap())
            .collect();

        assert_eq!(columns[0], "\"enabled\" BOOLEAN NOT NULL UNIQUE DEFAULT TRUE");
        assert_eq!(columns[1], "\"label\" VARCHAR(20) DEFAULT 'it''s'");
        assert_eq!(columns[2], "\"rank\" INTEGER DEFAULT 3");
        assert_eq!(columns[3], "\"created_at\" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP");
        assert_eq!(columns[4], "\"updated_at\" TIMESTAMP DEFAULT NULL");
    }

    #[test]
    fn test_mysql_type_mapping() {
        let t = translator(Backend::MySQL);
        let op = Operation::create_table("m")
            .add_boolean("b", ColumnOptions::new().default_value(false))
            .add_timestamp("ts", ColumnOptions::new())
            .add_numeric("n", ColumnOptions::new().length(10))
            .finalize();
        let defs: Vec<String> = op
            .columns()
            .iter()
            .map(|c| t.column_definition("m", c).unwrap())
            .collect();
        assert_eq!(defs[0], "`b` TINYINT(1) DEFAULT 0");
        assert_eq!(defs[1], "`ts` DATETIME");
        assert_eq!(defs[2], "`n` DECIMAL(10)");
    }

    #[test]
    fn test_primary_index_is_not_emitted_separately() {
        let op = Operation::create_table("t")
            .add_primary("id")
            .add_integer("score", ColumnOptions::new())
            .add_index("t_score", &["score DESC"], IndexOptions::unique())
            .finalize();

        let statements = translator(Backend::Postgres).execute_statements(&op).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1].sql,
            "CREATE UNIQUE INDEX \"t_score\" ON \"t\" (\"score\" DESC)"
        );
        assert!(!statements.iter().any(|s| s.sql.contains("t_id_pk")));
    }

    #[test]
    fn test_partial_index_support_per_dialect() {
        let op = Operation::create_table("t")
            .add_integer("a", ColumnOptions::new())
            .add_index("t_a", &["a"], IndexOptions::default().filtered("a > 0"))
            .finalize();

        let pg = translator(Backend::Postgres).execute_statements(&op).unwrap();
        assert_eq!(pg[1].sql, "CREATE INDEX \"t_a\" ON \"t\" (\"a\" ASC) WHERE a > 0");

        let sqlite = translator(Backend::SQLite).execute_statements(&op).unwrap();
        assert!(sqlite[1].sql.ends_with("WHERE a > 0"));

        let err = translator(Backend::MySQL).execute_statements(&op).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
        assert!(err.to_string().contains("t_a"));
    }

    #[test]
    fn test_auto_increment_on_non_integer_fails() {
        let mut column = Column::new("code", ColumnType::VarChar);
        column.auto_increment = true;
        column.primary = true;
        let err = translator(Backend::Postgres)
            .column_definition("t", &column)
            .unwrap_err();
        assert!(err.to_string().contains("VARCHAR"));
    }

    #[test]
    fn test_auto_increment_without_primary() {
        let mut column = Column::new("seq", ColumnType::Integer);
        column.auto_increment = true;

        let pg = translator(Backend::Postgres).column_definition("t", &column).unwrap();
        assert_eq!(pg, "\"seq\" SERIAL");

        assert!(translator(Backend::MySQL).column_definition("t", &column).is_err());
        assert!(translator(Backend::SQLite).column_definition("t", &column).is_err());
    }

    #[test]
    fn test_revert_create_table() {
        let op = Operation::create_table("t")
            .add_primary("id")
            .add_integer("a", ColumnOptions::new())
            .add_index("t_a", &["a"], IndexOptions::default())
            .finalize();

        let pg = translator(Backend::Postgres).revert_statements(&op).unwrap();
        assert_eq!(pg.len(), 2);
        assert_eq!(pg[0].sql, "DROP INDEX IF EXISTS \"t_a\"");
        assert_eq!(pg[0].kind, StatementKind::DropIndex);
        assert_eq!(pg[1].sql, "DROP TABLE \"t\"");
        assert_eq!(pg[1].kind, StatementKind::Ddl);

        let mysql = translator(Backend::MySQL).revert_statements(&op).unwrap();
        assert_eq!(mysql[0].sql, "DROP INDEX `t_a` ON `t`");
    }

    #[test]
    fn test_alter_table_statements() {
        let op = Operation::alter_table("users")
            .add_var_char("nickname", 30, ColumnOptions::new())
            .add_boolean("verified", ColumnOptions::new().default_value(false))
            .add_index("users_nickname", &["nickname"], IndexOptions::default())
            .finalize();
        let t = translator(Backend::SQLite);

        let up = t.execute_statements(&op).unwrap();
        assert_eq!(up.len(), 3);
        assert_eq!(
            up[0].sql,
            "ALTER TABLE \"users\" ADD COLUMN \"nickname\" VARCHAR(30)"
        );
        assert_eq!(
            up[1].sql,
            "ALTER TABLE \"users\" ADD COLUMN \"verified\" INTEGER DEFAULT 0"
        );

        let down = t.revert_statements(&op).unwrap();
        assert_eq!(down[0].kind, StatementKind::DropIndex);
        assert_eq!(down[1].sql, "ALTER TABLE \"users\" DROP COLUMN \"verified\"");
        assert_eq!(down[2].sql, "ALTER TABLE \"users\" DROP COLUMN \"nickname\"");
    }

    #[test]
    fn test_sqlite_rejects_constrained_add_column() {
        let op = Operation::alter_table("users")
            .add_var_char("email", 100, ColumnOptions::new().unique())
            .finalize();
        let err = translator(Backend::SQLite).execute_statements(&op).unwrap_err();
        assert!(err.to_string().contains("alterTable"));
        assert!(translator(Backend::Postgres).execute_statements(&op).is_ok());
    }

    #[test]
    fn test_ledger_sql() {
        let t = translator(Backend::Postgres);
        assert_eq!(
            t.ledger_table_sql("_migrations").unwrap(),
            "CREATE TABLE IF NOT EXISTS \"_migrations\" (\n  \"id\" VARCHAR(255) NOT NULL PRIMARY KEY,\n  \"applied_at\" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n)"
        );
        assert_eq!(
            t.insert_applied_sql("_migrations"),
            "INSERT INTO \"_migrations\" (\"id\") VALUES ($1)"
        );

        let mysql = translator(Backend::MySQL);
        assert_eq!(
            mysql.delete_applied_sql("_migrations"),
            "DELETE FROM `_migrations` WHERE `id` = ?"
        );
    }
}
