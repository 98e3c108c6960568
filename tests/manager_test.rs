//! Manager behavior over the in-memory document store

use async_trait::async_trait;
use rustf_migrations::{
    AdapterTransaction, Backend, ColumnOptions, DocumentStoreAdapter, Error, IndexOptions,
    MemoryDocumentClient, Migration, MigrationAdapter, MigrationManager, Operation, Result,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn create_table(id: &str, table: &str) -> Migration {
    Migration::new(
        id,
        format!("create {}", table),
        vec![Operation::create_table(table)
            .add_primary("id")
            .add_var_char("name", 50, ColumnOptions::new().required())
            .add_index(
                &format!("{}_name", table),
                &["name"],
                IndexOptions::default(),
            )
            .finalize()],
        vec![Operation::create_table(table).finalize()],
    )
}

fn failing(id: &str) -> Migration {
    Migration::new(
        id,
        "filtered index",
        vec![Operation::alter_table("users")
            .add_index("active_users", &["name"], IndexOptions::default().filtered("active"))
            .finalize()],
        vec![],
    )
}

fn manager(client: &MemoryDocumentClient, migrations: Vec<Migration>) -> MigrationManager {
    let adapter = DocumentStoreAdapter::new("docs", Arc::new(client.clone())).unwrap();
    MigrationManager::new(Box::new(adapter), migrations).unwrap()
}

fn ids(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_migrate_up_applies_in_id_order() {
    let client = MemoryDocumentClient::new();
    let mut manager = manager(
        &client,
        vec![
            create_table("003", "orders"),
            create_table("001", "users"),
            create_table("002", "products"),
        ],
    );

    let report = manager.migrate_up().await.unwrap();
    assert_eq!(report.applied, vec!["001", "002", "003"]);
    assert_eq!(
        manager.get_applied_migrations().await.unwrap(),
        ids(&["001", "002", "003"])
    );

    // ledger documents were written in apply order
    let ledger: Vec<String> = client
        .documents("_migrations")
        .await
        .iter()
        .map(|doc| doc["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ledger, vec!["001", "002", "003"]);
}

#[tokio::test]
async fn test_second_migrate_up_is_a_no_op() {
    let client = MemoryDocumentClient::new();
    let mut manager = manager(&client, vec![create_table("001", "users")]);

    manager.migrate_up().await.unwrap();
    let report = manager.migrate_up().await.unwrap();

    assert!(report.is_empty());
    assert_eq!(manager.get_applied_migrations().await.unwrap(), ids(&["001"]));
    assert_eq!(client.documents("_migrations").await.len(), 1);
}

#[tokio::test]
async fn test_up_then_down_round_trip() {
    let client = MemoryDocumentClient::new();
    let mut manager = manager(&client, vec![create_table("001", "users")]);

    manager.migrate_up().await.unwrap();
    assert_eq!(
        client.index_names("users").await,
        Some(vec!["users_id_pk".to_string(), "users_name".to_string()])
    );

    assert_eq!(manager.migrate_down().await.unwrap(), Some("001".to_string()));
    assert!(manager.get_applied_migrations().await.unwrap().is_empty());
    assert_eq!(client.collection_names().await, vec!["_migrations"]);

    assert_eq!(manager.migrate_down().await.unwrap(), None);
}

#[tokio::test]
async fn test_failure_aborts_and_keeps_earlier_migrations() {
    let client = MemoryDocumentClient::new();
    let mut manager = manager(
        &client,
        vec![
            create_table("001", "users"),
            failing("002"),
            create_table("003", "orders"),
        ],
    );

    let err = manager.migrate_up().await.unwrap_err();
    assert_eq!(err.migration_id(), Some("002"));
    match err {
        Error::MigrationApply { source, .. } => {
            assert!(matches!(*source, Error::UnsupportedOperation(_)))
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(manager.get_applied_migrations().await.unwrap(), ids(&["001"]));
    // 003 was never attempted
    assert_eq!(client.index_names("orders").await, None);
    // the failing migration left no partial state
    assert_eq!(
        client.index_names("users").await,
        Some(vec!["users_id_pk".to_string(), "users_name".to_string()])
    );
}

#[tokio::test]
async fn test_failed_ddl_rolls_back_the_whole_migration() {
    let client = MemoryDocumentClient::new();
    // second operation recreates an existing collection
    let migration = Migration::new(
        "001",
        "twice",
        vec![
            Operation::create_table("users").finalize(),
            Operation::create_table("users").finalize(),
        ],
        vec![],
    );
    let mut manager = manager(&client, vec![migration]);

    assert!(manager.migrate_up().await.is_err());
    assert!(manager.get_applied_migrations().await.unwrap().is_empty());
    assert_eq!(client.collection_names().await, vec!["_migrations"]);
}

#[tokio::test]
async fn test_migrate_down_picks_greatest_applied_id() {
    let client = MemoryDocumentClient::new();
    let mut manager = manager(
        &client,
        vec![create_table("001", "users"), create_table("002", "orders")],
    );
    manager.migrate_up().await.unwrap();

    assert_eq!(manager.migrate_down().await.unwrap(), Some("002".to_string()));
    assert_eq!(manager.get_applied_migrations().await.unwrap(), ids(&["001"]));
    assert_eq!(client.index_names("orders").await, None);
}

#[tokio::test]
async fn test_migrate_down_to_target() {
    let client = MemoryDocumentClient::new();
    let mut manager = manager(
        &client,
        vec![
            create_table("001", "users"),
            create_table("002", "orders"),
            create_table("003", "invoices"),
        ],
    );
    manager.migrate_up().await.unwrap();

    let reverted = manager.migrate_down_to("001").await.unwrap();
    assert_eq!(reverted, vec!["003", "002"]);
    assert_eq!(manager.get_applied_migrations().await.unwrap(), ids(&["001"]));

    assert!(manager.migrate_down_to("001").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_and_pending() {
    let client = MemoryDocumentClient::new();
    let mut first = manager(&client, vec![create_table("001", "users")]);
    first.migrate_up().await.unwrap();

    let mut manager = manager(
        &client,
        vec![create_table("001", "users"), create_table("002", "orders")],
    );

    let pending: Vec<&str> = manager
        .pending()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id())
        .collect();
    assert_eq!(pending, vec!["002"]);

    let status = manager.status().await.unwrap();
    assert_eq!(status.backend, Backend::Document);
    assert_eq!(status.entries.len(), 2);
    assert!(status.entries[0].applied);
    assert!(!status.entries[1].applied);
    assert_eq!(status.entries[1].description, "create orders");
    assert!(status.to_string().contains("002 | pending | create orders"));

    // status never mutates
    assert_eq!(manager.get_applied_migrations().await.unwrap(), ids(&["001"]));
}

#[tokio::test]
async fn test_removed_migration_is_reported_as_orphan() {
    let client = MemoryDocumentClient::new();
    manager(&client, vec![create_table("001", "users")])
        .migrate_up()
        .await
        .unwrap();

    let mut manager = manager(&client, vec![create_table("002", "orders")]);
    let status = manager.status().await.unwrap();
    assert_eq!(status.orphaned, vec!["001"]);

    // the orphan is never reverted
    assert_eq!(manager.migrate_down().await.unwrap(), None);
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let client = MemoryDocumentClient::new();
    let adapter = DocumentStoreAdapter::new("docs", Arc::new(client)).unwrap();
    let result = MigrationManager::new(
        Box::new(adapter),
        vec![create_table("001", "users"), create_table("001", "orders")],
    );
    assert!(matches!(result, Err(Error::DuplicateMigration(id)) if id == "001"));
}

#[tokio::test]
async fn test_checksum_mismatch_blocks_apply() {
    let client = MemoryDocumentClient::new();
    let migration = create_table("001", "users").with_checksum("not-a-real-checksum");
    let mut manager = manager(&client, vec![migration]);

    let err = manager.migrate_up().await.unwrap_err();
    assert_eq!(err.error_code(), "E_MIGRATION_APPLY");
    assert_eq!(client.index_names("users").await, None);
}

/// Counts ledger initialization calls on the wrapped adapter
struct CountingAdapter {
    inner: DocumentStoreAdapter,
    ensure_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MigrationAdapter for CountingAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn backend(&self) -> Backend {
        self.inner.backend()
    }

    async fn ensure_migration_table(&self) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_migration_table().await
    }

    async fn ledger_exists(&self) -> Result<bool> {
        self.inner.ledger_exists().await
    }

    async fn fetch_applied_ids(&self) -> Result<BTreeSet<String>> {
        self.inner.fetch_applied_ids().await
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn AdapterTransaction + 'a>> {
        self.inner.begin().await
    }
}

#[tokio::test]
async fn test_ledger_is_initialized_once() {
    let client = MemoryDocumentClient::new();
    let ensure_calls = Arc::new(AtomicUsize::new(0));
    let adapter = CountingAdapter {
        inner: DocumentStoreAdapter::new("docs", Arc::new(client.clone())).unwrap(),
        ensure_calls: ensure_calls.clone(),
    };
    let mut manager =
        MigrationManager::new(Box::new(adapter), vec![create_table("001", "users")]).unwrap();

    assert_eq!(ensure_calls.load(Ordering::SeqCst), 0);
    manager.status().await.unwrap();
    assert_eq!(ensure_calls.load(Ordering::SeqCst), 0);
    manager.migrate_up().await.unwrap();
    manager.migrate_down().await.unwrap();
    manager.status().await.unwrap();
    assert_eq!(ensure_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_status_on_fresh_store_creates_nothing() {
    let client = MemoryDocumentClient::new();
    let mut manager = manager(&client, vec![create_table("001", "users")]);

    let status = manager.status().await.unwrap();
    assert_eq!(status.pending_count(), 1);
    assert_eq!(manager.pending().await.unwrap().len(), 1);
    assert!(manager.get_applied_migrations().await.unwrap().is_empty());
    assert!(client.collection_names().await.is_empty());
}
