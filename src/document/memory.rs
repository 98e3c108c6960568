//! In-memory document client
//!
//! Each session works on a private snapshot of the whole store taken when
//! it starts. `commit` replaces the shared store with the snapshot, `abort`
//! discards it. Sessions are not isolated from each other beyond that; the
//! last commit wins.

use super::{matches_filter, DocumentClient, DocumentSession, IndexModel};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct Collection {
    indexes: Vec<IndexModel>,
    documents: Vec<JsonValue>,
}

impl Collection {
    fn index(&self, name: &str) -> Option<&IndexModel> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// First unique index that `document` would violate
    fn violated_unique_index(&self, document: &JsonValue) -> Option<&IndexModel> {
        self.indexes.iter().filter(|i| i.unique).find(|index| {
            let key = unique_key(index, document);
            self.documents
                .iter()
                .any(|existing| unique_key(index, existing) == key)
        })
    }
}

fn unique_key(index: &IndexModel, document: &JsonValue) -> Vec<JsonValue> {
    index
        .keys
        .iter()
        .map(|(field, _)| document.get(field).cloned().unwrap_or(JsonValue::Null))
        .collect()
}

type Store = BTreeMap<String, Collection>;

/// Document client keeping every collection in process memory
#[derive(Clone)]
pub struct MemoryDocumentClient {
    store: Arc<Mutex<Store>>,
    transactions: bool,
}

impl MemoryDocumentClient {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::new())),
            transactions: true,
        }
    }

    /// A client reporting no transaction support
    pub fn without_transactions() -> Self {
        Self {
            transactions: false,
            ..Self::new()
        }
    }

    /// Committed collection names
    pub async fn collection_names(&self) -> Vec<String> {
        self.store.lock().await.keys().cloned().collect()
    }

    /// Committed index names of `collection`, `None` if it does not exist
    pub async fn index_names(&self, collection: &str) -> Option<Vec<String>> {
        self.store
            .lock()
            .await
            .get(collection)
            .map(|c| c.indexes.iter().map(|i| i.name.clone()).collect())
    }

    /// Committed index definition
    pub async fn index(&self, collection: &str, name: &str) -> Option<IndexModel> {
        self.store
            .lock()
            .await
            .get(collection)
            .and_then(|c| c.index(name).cloned())
    }

    /// Committed documents of `collection`
    pub async fn documents(&self, collection: &str) -> Vec<JsonValue> {
        self.store
            .lock()
            .await
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default()
    }
}

impl Default for MemoryDocumentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentClient for MemoryDocumentClient {
    fn supports_transactions(&self) -> bool {
        self.transactions
    }

    async fn start_session<'a>(&'a self) -> Result<Box<dyn DocumentSession + 'a>> {
        let snapshot = self.store.lock().await.clone();
        Ok(Box::new(MemorySession {
            client: self,
            snapshot,
        }))
    }
}

struct MemorySession<'a> {
    client: &'a MemoryDocumentClient,
    snapshot: Store,
}

impl MemorySession<'_> {
    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.snapshot
            .get_mut(name)
            .ok_or_else(|| Error::document_store(format!("collection '{}' does not exist", name)))
    }
}

#[async_trait]
impl<'a> DocumentSession for MemorySession<'a> {
    async fn has_collection(&mut self, name: &str) -> Result<bool> {
        Ok(self.snapshot.contains_key(name))
    }

    async fn create_collection(&mut self, name: &str) -> Result<()> {
        if self.snapshot.contains_key(name) {
            return Err(Error::document_store(format!(
                "collection '{}' already exists",
                name
            )));
        }
        self.snapshot.insert(name.to_string(), Collection::default());
        Ok(())
    }

    async fn drop_collection(&mut self, name: &str) -> Result<()> {
        self.snapshot.remove(name);
        Ok(())
    }

    async fn create_index(&mut self, collection: &str, index: IndexModel) -> Result<()> {
        if index.keys.is_empty() {
            return Err(Error::document_store(format!(
                "index '{}' has no keys",
                index.name
            )));
        }
        // implicit collection creation, as document stores do
        let target = self.snapshot.entry(collection.to_string()).or_default();
        match target.index(&index.name) {
            Some(existing) if *existing == index => Ok(()),
            Some(_) => Err(Error::document_store(format!(
                "index '{}' already exists on '{}' with different options",
                index.name, collection
            ))),
            None => {
                target.indexes.push(index);
                Ok(())
            }
        }
    }

    async fn drop_index(&mut self, collection: &str, name: &str) -> Result<()> {
        let target = self
            .snapshot
            .get_mut(collection)
            .ok_or_else(|| Error::IndexNotFound(format!("{}.{}", collection, name)))?;
        let before = target.indexes.len();
        target.indexes.retain(|i| i.name != name);
        if target.indexes.len() == before {
            return Err(Error::IndexNotFound(format!("{}.{}", collection, name)));
        }
        Ok(())
    }

    async fn insert_document(&mut self, collection: &str, document: JsonValue) -> Result<()> {
        let target = self.collection_mut(collection)?;
        if let Some(index) = target.violated_unique_index(&document) {
            return Err(Error::document_store(format!(
                "duplicate key for unique index '{}' on '{}'",
                index.name, collection
            )));
        }
        target.documents.push(document);
        Ok(())
    }

    async fn delete_documents(&mut self, collection: &str, filter: &JsonValue) -> Result<u64> {
        let target = self.collection_mut(collection)?;
        let before = target.documents.len();
        target.documents.retain(|doc| !matches_filter(doc, filter));
        Ok((before - target.documents.len()) as u64)
    }

    async fn find_documents(
        &mut self,
        collection: &str,
        filter: &JsonValue,
    ) -> Result<Vec<JsonValue>> {
        Ok(self
            .snapshot
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|doc| matches_filter(doc, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemorySession { client, snapshot } = *self;
        *client.store.lock().await = snapshot;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let client = MemoryDocumentClient::new();
        let mut session = client.start_session().await.unwrap();
        session.create_collection("users").await.unwrap();
        session
            .insert_document("users", json!({"name": "ada"}))
            .await
            .unwrap();

        // nothing visible before commit
        assert!(client.collection_names().await.is_empty());

        session.commit().await.unwrap();
        assert_eq!(client.collection_names().await, vec!["users"]);
        assert_eq!(client.documents("users").await.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_discards_changes() {
        let client = MemoryDocumentClient::new();
        let mut session = client.start_session().await.unwrap();
        session.create_collection("users").await.unwrap();
        session.abort().await.unwrap();
        assert!(client.collection_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_collection_twice_fails() {
        let client = MemoryDocumentClient::new();
        let mut session = client.start_session().await.unwrap();
        session.create_collection("users").await.unwrap();
        assert!(matches!(
            session.create_collection("users").await,
            Err(Error::DocumentStore(_))
        ));
    }

    #[tokio::test]
    async fn test_drop_missing_index() {
        let client = MemoryDocumentClient::new();
        let mut session = client.start_session().await.unwrap();
        session.create_collection("users").await.unwrap();
        session
            .create_index("users", IndexModel::new("users_name").key("name", 1))
            .await
            .unwrap();
        session.drop_index("users", "users_name").await.unwrap();
        assert!(matches!(
            session.drop_index("users", "users_name").await,
            Err(Error::IndexNotFound(_))
        ));
        assert!(matches!(
            session.drop_index("missing", "users_name").await,
            Err(Error::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let client = MemoryDocumentClient::new();
        let mut session = client.start_session().await.unwrap();
        session.create_collection("ledger").await.unwrap();
        session
            .create_index("ledger", IndexModel::new("ledger_id").key("id", 1).unique(true))
            .await
            .unwrap();
        session
            .insert_document("ledger", json!({"id": "001"}))
            .await
            .unwrap();
        assert!(session
            .insert_document("ledger", json!({"id": "001"}))
            .await
            .is_err());
        session
            .insert_document("ledger", json!({"id": "002"}))
            .await
            .unwrap();

        let removed = session
            .delete_documents("ledger", &json!({"id": "001"}))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let left = session.find_documents("ledger", &json!({})).await.unwrap();
        assert_eq!(left, vec![json!({"id": "002"})]);
    }

    #[test]
    fn test_without_transactions() {
        assert!(MemoryDocumentClient::new().supports_transactions());
        assert!(!MemoryDocumentClient::without_transactions().supports_transactions());
    }
}
