//! Document-store client contract
//!
//! The migration engine never talks to a document database driver directly.
//! A driver is wrapped in a [`DocumentClient`] whose sessions expose the few
//! calls schema migrations need: collection and index management plus the
//! ledger's document reads and writes. Every call made through one session
//! becomes visible together on [`DocumentSession::commit`].

pub mod memory;

pub use memory::MemoryDocumentClient;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Index definition handed to the driver
///
/// Each key is a field name with direction `1` (ascending) or `-1`
/// (descending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexModel {
    pub name: String,
    pub keys: Vec<(String, i32)>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            unique: false,
        }
    }

    pub fn key(mut self, field: impl Into<String>, direction: i32) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

/// Connection to a document database
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Whether sessions can group writes atomically
    ///
    /// Adapters refuse clients that cannot, since a migration and its ledger
    /// entry must commit together.
    fn supports_transactions(&self) -> bool;

    async fn start_session<'a>(&'a self) -> Result<Box<dyn DocumentSession + 'a>>;
}

/// One transactional session on a [`DocumentClient`]
#[async_trait]
pub trait DocumentSession: Send {
    async fn has_collection(&mut self, name: &str) -> Result<bool>;

    /// Fails when the collection already exists
    async fn create_collection(&mut self, name: &str) -> Result<()>;

    /// Drops the collection with its documents and indexes; missing is fine
    async fn drop_collection(&mut self, name: &str) -> Result<()>;

    async fn create_index(&mut self, collection: &str, index: IndexModel) -> Result<()>;

    /// Fails with [`Error::IndexNotFound`](crate::Error::IndexNotFound) when
    /// no index of that name exists
    async fn drop_index(&mut self, collection: &str, name: &str) -> Result<()>;

    async fn insert_document(&mut self, collection: &str, document: JsonValue) -> Result<()>;

    /// Delete documents whose fields equal every field of `filter`
    async fn delete_documents(&mut self, collection: &str, filter: &JsonValue) -> Result<u64>;

    /// Documents whose fields equal every field of `filter`
    async fn find_documents(
        &mut self,
        collection: &str,
        filter: &JsonValue,
    ) -> Result<Vec<JsonValue>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn abort(self: Box<Self>) -> Result<()>;
}

/// Equality match used by filters: an empty or non-object filter matches all
pub fn matches_filter(document: &JsonValue, filter: &JsonValue) -> bool {
    match filter.as_object() {
        Some(fields) => fields
            .iter()
            .all(|(key, expected)| document.get(key) == Some(expected)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_model_builder() {
        let model = IndexModel::new("users_email")
            .key("email", 1)
            .key("created_at", -1)
            .unique(true);
        assert_eq!(
            model.keys,
            vec![("email".to_string(), 1), ("created_at".to_string(), -1)]
        );
        assert!(model.unique);
    }

    #[test]
    fn test_matches_filter() {
        let doc = json!({"id": "001", "appliedAt": "2024-01-01T00:00:00Z"});
        assert!(matches_filter(&doc, &json!({"id": "001"})));
        assert!(!matches_filter(&doc, &json!({"id": "002"})));
        assert!(!matches_filter(&doc, &json!({"missing": 1})));
        assert!(matches_filter(&doc, &json!({})));
    }
}
