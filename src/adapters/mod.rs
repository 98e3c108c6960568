//! Migration adapter implementations for each supported backend

/// Ledger and transaction plumbing shared by the sqlx adapters
///
/// Generates the `MigrationAdapter` impl for `$adapter`, the `$tx`
/// transaction struct and its `AdapterTransaction` impl. The adapter
/// struct needs `name`, `pool`, `translator` and `ledger_table` fields,
/// and its module must define `async fn run(&mut self, Statement)` on `$tx`.
macro_rules! impl_sqlx_adapter {
    ($adapter:ident, $tx:ident, $db:ty, $backend:expr) => {
        #[async_trait::async_trait]
        impl $crate::adapter::MigrationAdapter for $adapter {
            fn name(&self) -> &str {
                &self.name
            }

            fn backend(&self) -> $crate::adapter::Backend {
                $backend
            }

            async fn ensure_migration_table(&self) -> $crate::error::Result<()> {
                let sql = self.translator.ledger_table_sql(&self.ledger_table)?;
                sqlx::query(&sql).execute(&*self.pool).await?;
                Ok(())
            }

            async fn ledger_exists(&self) -> $crate::error::Result<bool> {
                let sql = self.translator.dialect().table_exists_sql();
                let count: i64 = sqlx::query_scalar(&sql)
                    .bind(&self.ledger_table)
                    .fetch_one(&*self.pool)
                    .await?;
                Ok(count > 0)
            }

            async fn fetch_applied_ids(
                &self,
            ) -> $crate::error::Result<std::collections::BTreeSet<String>> {
                let sql = self.translator.select_applied_ids_sql(&self.ledger_table);
                let ids: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&*self.pool).await?;
                Ok(ids.into_iter().collect())
            }

            async fn begin<'a>(
                &'a self,
            ) -> $crate::error::Result<Box<dyn $crate::adapter::AdapterTransaction + 'a>> {
                let tx = self.pool.begin().await?;
                Ok(Box::new($tx { adapter: self, tx }))
            }
        }

        struct $tx<'a> {
            adapter: &'a $adapter,
            tx: sqlx::Transaction<'static, $db>,
        }

        #[async_trait::async_trait]
        impl<'a> $crate::adapter::AdapterTransaction for $tx<'a> {
            async fn execute_operation(
                &mut self,
                op: &$crate::operation::Operation,
            ) -> $crate::error::Result<()> {
                let statements = self.adapter.translator.execute_statements(op)?;
                let total = statements.len();
                for (done, statement) in statements.into_iter().enumerate() {
                    if let Err(e) = self.run(statement).await {
                        if done > 0 && !self.adapter.translator.dialect().supports_transactional_ddl()
                        {
                            log::warn!(
                                "[{}] {} of {} statements for '{}' were committed before the failure",
                                self.adapter.name,
                                done,
                                total,
                                op.table_name()
                            );
                        }
                        return Err(e);
                    }
                }
                Ok(())
            }

            async fn revert_operation(
                &mut self,
                op: &$crate::operation::Operation,
            ) -> $crate::error::Result<()> {
                for statement in self.adapter.translator.revert_statements(op)? {
                    self.run(statement).await?;
                }
                Ok(())
            }

            async fn record_applied_migration(&mut self, id: &str) -> $crate::error::Result<()> {
                let sql = self.adapter.translator.insert_applied_sql(&self.adapter.ledger_table);
                sqlx::query(&sql).bind(id).execute(&mut *self.tx).await?;
                Ok(())
            }

            async fn record_rolled_back_migration(
                &mut self,
                id: &str,
            ) -> $crate::error::Result<()> {
                let sql = self.adapter.translator.delete_applied_sql(&self.adapter.ledger_table);
                sqlx::query(&sql).bind(id).execute(&mut *self.tx).await?;
                Ok(())
            }

            async fn commit(self: Box<Self>) -> $crate::error::Result<()> {
                self.tx.commit().await?;
                Ok(())
            }

            async fn rollback(self: Box<Self>) -> $crate::error::Result<()> {
                self.tx.rollback().await?;
                Ok(())
            }
        }
    };
}

pub mod any;
pub mod document;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use any::AnyAdapter;
pub use document::DocumentStoreAdapter;
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;
