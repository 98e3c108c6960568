//! Document-store migration adapter
//!
//! Collections are schemaless, so column definitions are accepted and
//! ignored. Only collections and indexes are materialized. The ledger is a
//! collection with a unique index on `id` holding `{id, appliedAt}`
//! documents.

use crate::adapter::{
    AdapterTransaction, AppliedMigrationRecord, Backend, MigrationAdapter, DEFAULT_LEDGER_TABLE,
};
use crate::document::{DocumentClient, DocumentSession, IndexModel};
use crate::error::{Error, Result};
use crate::operation::{Index, Operation, OperationKind};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Migration adapter over a [`DocumentClient`]
#[derive(Clone)]
pub struct DocumentStoreAdapter {
    name: String,
    client: Arc<dyn DocumentClient>,
    ledger_collection: String,
}

impl DocumentStoreAdapter {
    /// Wrap `client`; fails when it cannot group writes into a transaction
    pub fn new(name: impl Into<String>, client: Arc<dyn DocumentClient>) -> Result<Self> {
        let name = name.into();
        if !client.supports_transactions() {
            return Err(Error::adapter_contract(format!(
                "document client for '{}' does not support transactions",
                name
            )));
        }
        Ok(Self {
            name,
            client,
            ledger_collection: DEFAULT_LEDGER_TABLE.to_string(),
        })
    }

    pub fn with_ledger_collection(mut self, collection: impl Into<String>) -> Self {
        self.ledger_collection = collection.into();
        self
    }

    pub fn ledger_collection(&self) -> &str {
        &self.ledger_collection
    }

    fn ledger_index(&self) -> IndexModel {
        IndexModel::new(format!("{}_id", self.ledger_collection))
            .key("id", 1)
            .unique(true)
    }
}

/// Map an abstract index onto the driver's index definition
///
/// Partial indexes are rejected rather than created without their filter.
pub fn index_model(table: &str, index: &Index) -> Result<IndexModel> {
    if index.predicate.is_some() {
        return Err(Error::unsupported(format!(
            "partial index '{}' on '{}': filtered indexes are not supported by the document adapter",
            index.name, table
        )));
    }
    if index.columns.is_empty() {
        return Err(Error::unsupported(format!(
            "index '{}' on '{}' has no columns",
            index.name, table
        )));
    }

    Ok(index.columns.iter().fold(
        IndexModel::new(&index.name).unique(index.unique || index.primary),
        |model, column| model.key(&column.name, column.order.direction()),
    ))
}

#[async_trait]
impl MigrationAdapter for DocumentStoreAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> Backend {
        Backend::Document
    }

    async fn ensure_migration_table(&self) -> Result<()> {
        let mut session = self.client.start_session().await?;
        if !session.has_collection(&self.ledger_collection).await? {
            log::debug!(
                "[{}] creating ledger collection '{}'",
                self.name,
                self.ledger_collection
            );
            session.create_collection(&self.ledger_collection).await?;
            session
                .create_index(&self.ledger_collection, self.ledger_index())
                .await?;
        }
        session.commit().await
    }

    async fn ledger_exists(&self) -> Result<bool> {
        let mut session = self.client.start_session().await?;
        let exists = session.has_collection(&self.ledger_collection).await?;
        session.abort().await?;
        Ok(exists)
    }

    async fn fetch_applied_ids(&self) -> Result<BTreeSet<String>> {
        let mut session = self.client.start_session().await?;
        let documents = session
            .find_documents(&self.ledger_collection, &json!({}))
            .await?;
        session.abort().await?;

        documents
            .into_iter()
            .map(|doc| -> Result<String> {
                Ok(serde_json::from_value::<AppliedMigrationRecord>(doc)?.id)
            })
            .collect()
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn AdapterTransaction + 'a>> {
        let session = self.client.start_session().await?;
        Ok(Box::new(DocumentTransaction {
            adapter: self,
            session,
        }))
    }
}

struct DocumentTransaction<'a> {
    adapter: &'a DocumentStoreAdapter,
    session: Box<dyn DocumentSession + 'a>,
}

#[async_trait]
impl<'a> AdapterTransaction for DocumentTransaction<'a> {
    async fn execute_operation(&mut self, op: &Operation) -> Result<()> {
        let table = op.table_name();
        // translate every index before touching the store
        let models = op
            .indexes()
            .iter()
            .map(|index| index_model(table, index))
            .collect::<Result<Vec<_>>>()?;

        if op.kind() == OperationKind::CreateTable {
            log::debug!("[{}] create collection '{}'", self.adapter.name, table);
            self.session.create_collection(table).await?;
        }
        for model in models {
            log::debug!("[{}] create index '{}' on '{}'", self.adapter.name, model.name, table);
            self.session.create_index(table, model).await?;
        }
        Ok(())
    }

    async fn revert_operation(&mut self, op: &Operation) -> Result<()> {
        let table = op.table_name();
        for index in op.indexes() {
            match self.session.drop_index(table, &index.name).await {
                Ok(()) => {}
                Err(Error::IndexNotFound(missing)) => {
                    log::warn!("[{}] index already gone: {}", self.adapter.name, missing);
                }
                Err(e) => return Err(e),
            }
        }

        if op.kind() == OperationKind::CreateTable {
            log::debug!("[{}] drop collection '{}'", self.adapter.name, table);
            self.session.drop_collection(table).await?;
        }
        Ok(())
    }

    async fn record_applied_migration(&mut self, id: &str) -> Result<()> {
        let record = serde_json::to_value(AppliedMigrationRecord::new(id))?;
        self.session
            .insert_document(&self.adapter.ledger_collection, record)
            .await
    }

    async fn record_rolled_back_migration(&mut self, id: &str) -> Result<()> {
        self.session
            .delete_documents(&self.adapter.ledger_collection, &json!({ "id": id }))
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.session.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.session.abort().await
    }
}
