//! Migration orchestration
//!
//! [`MigrationManager`] diffs the known migrations against the ledger and
//! applies or reverts them one at a time. Each migration runs in its own
//! transaction: a failing migration is rolled back and stops the run, while
//! migrations committed before it stay applied.

use crate::adapter::{transaction, Backend, MigrationAdapter};
use crate::error::{Error, Result};
use crate::migration::Migration;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Ready,
}

/// Ids applied by one `migrate_up` call, in apply order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub id: String,
    pub description: String,
    pub applied: bool,
}

/// Read-only view of every known migration against the ledger
///
/// `Display` renders the tabular report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub backend: Backend,
    pub entries: Vec<StatusEntry>,
    /// Ledger ids with no matching migration
    pub orphaned: Vec<String>,
}

impl StatusReport {
    pub fn applied_count(&self) -> usize {
        self.entries.iter().filter(|e| e.applied).count()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len() - self.applied_count()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id_width = self
            .entries
            .iter()
            .map(|e| e.id.len())
            .chain(std::iter::once("ID".len()))
            .max()
            .unwrap_or(2);

        writeln!(f, "Migration status ({})", self.backend)?;
        writeln!(f, "{:<id_width$} | {:<7} | Description", "ID", "Status")?;
        writeln!(f, "{}-+-{}-+-{}", "-".repeat(id_width), "-".repeat(7), "-".repeat(11))?;
        for entry in &self.entries {
            let status = if entry.applied { "applied" } else { "pending" };
            writeln!(
                f,
                "{:<id_width$} | {:<7} | {}",
                entry.id, status, entry.description
            )?;
        }
        write!(
            f,
            "{} applied, {} pending",
            self.applied_count(),
            self.pending_count()
        )?;
        if !self.orphaned.is_empty() {
            write!(f, "\nOrphaned ledger entries: {}", self.orphaned.join(", "))?;
        }
        Ok(())
    }
}

/// Applies and reverts migrations through one adapter
///
/// Methods take `&mut self`, so a manager runs at most one operation at a
/// time. Nothing guards against a second process migrating the same
/// database concurrently.
pub struct MigrationManager {
    adapter: Box<dyn MigrationAdapter>,
    migrations: Vec<Migration>,
    state: State,
}

impl MigrationManager {
    /// Create a manager; migrations are sorted by id and ids must be unique
    pub fn new(adapter: Box<dyn MigrationAdapter>, mut migrations: Vec<Migration>) -> Result<Self> {
        migrations.sort_by(|a, b| a.id().cmp(b.id()));
        if let Some(pair) = migrations.windows(2).find(|w| w[0].id() == w[1].id()) {
            return Err(Error::DuplicateMigration(pair[0].id().to_string()));
        }

        Ok(Self {
            adapter,
            migrations,
            state: State::Uninitialized,
        })
    }

    /// Known migrations in apply order
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn adapter(&self) -> &dyn MigrationAdapter {
        self.adapter.as_ref()
    }

    /// Create the ledger on first use, then read it
    async fn ready_applied_ids(&mut self) -> Result<BTreeSet<String>> {
        if self.state == State::Uninitialized {
            self.adapter.ensure_migration_table().await?;
            self.state = State::Ready;
        }
        self.adapter.fetch_applied_ids().await
    }

    /// Read the ledger without creating it; a missing ledger is empty
    async fn read_applied_ids(&self) -> Result<BTreeSet<String>> {
        if self.state == State::Uninitialized && !self.adapter.ledger_exists().await? {
            return Ok(BTreeSet::new());
        }
        self.adapter.fetch_applied_ids().await
    }

    /// Ids currently recorded in the ledger
    pub async fn get_applied_migrations(&mut self) -> Result<BTreeSet<String>> {
        self.read_applied_ids().await
    }

    /// Migrations not yet applied, in apply order
    pub async fn pending(&mut self) -> Result<Vec<&Migration>> {
        let applied = self.read_applied_ids().await?;
        Ok(self
            .migrations
            .iter()
            .filter(|m| !applied.contains(m.id()))
            .collect())
    }

    /// Apply every pending migration in ascending id order
    ///
    /// Stops at the first failure. The failing migration is rolled back and
    /// the error names its id; migrations applied earlier in the run stay
    /// committed.
    pub async fn migrate_up(&mut self) -> Result<MigrationReport> {
        let applied = self.ready_applied_ids().await?;
        let adapter = self.adapter.as_ref();
        let mut report = MigrationReport::default();

        for migration in self.migrations.iter().filter(|m| !applied.contains(m.id())) {
            log::info!(
                "[{}] applying migration {}: {}",
                adapter.name(),
                migration.id(),
                migration.description()
            );

            apply(adapter, migration)
                .await
                .map_err(|e| Error::apply(migration.id(), e))?;
            report.applied.push(migration.id().to_string());
        }

        if report.is_empty() {
            log::info!("[{}] schema is up to date", adapter.name());
        }
        Ok(report)
    }

    /// Revert the applied migration with the greatest id
    ///
    /// Returns the reverted id, or `None` when nothing is applied.
    pub async fn migrate_down(&mut self) -> Result<Option<String>> {
        let applied = self.ready_applied_ids().await?;
        let adapter = self.adapter.as_ref();

        let Some(migration) = self
            .migrations
            .iter()
            .rev()
            .find(|m| applied.contains(m.id()))
        else {
            log::info!("[{}] no applied migrations to revert", adapter.name());
            return Ok(None);
        };

        log::info!(
            "[{}] reverting migration {}: {}",
            adapter.name(),
            migration.id(),
            migration.description()
        );
        revert(adapter, migration)
            .await
            .map_err(|e| Error::revert(migration.id(), e))?;

        Ok(Some(migration.id().to_string()))
    }

    /// Revert applied migrations until none with an id above `target` remain
    ///
    /// Returns the reverted ids, most recent first.
    pub async fn migrate_down_to(&mut self, target: &str) -> Result<Vec<String>> {
        let mut reverted = Vec::new();
        loop {
            let applied = self.ready_applied_ids().await?;
            let above_target = self
                .migrations
                .iter()
                .rev()
                .any(|m| m.id() > target && applied.contains(m.id()));
            if !above_target {
                break;
            }
            match self.migrate_down().await? {
                Some(id) => reverted.push(id),
                None => break,
            }
        }
        Ok(reverted)
    }

    /// Report of every known migration and whether it is applied
    pub async fn status(&mut self) -> Result<StatusReport> {
        let applied = self.read_applied_ids().await?;
        let known: HashSet<&str> = self.migrations.iter().map(|m| m.id()).collect();

        let entries = self
            .migrations
            .iter()
            .map(|m| StatusEntry {
                id: m.id().to_string(),
                description: m.description().to_string(),
                applied: applied.contains(m.id()),
            })
            .collect();
        let orphaned = applied
            .iter()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect();

        Ok(StatusReport {
            backend: self.adapter.backend(),
            entries,
            orphaned,
        })
    }
}

async fn apply(adapter: &dyn MigrationAdapter, migration: &Migration) -> Result<()> {
    migration.verify_checksum()?;
    let migration = migration.clone();

    transaction(adapter, move |tx| {
        Box::pin(async move {
            for op in migration.up() {
                tx.execute_operation(op).await?;
            }
            tx.record_applied_migration(migration.id()).await
        })
    })
    .await
}

async fn revert(adapter: &dyn MigrationAdapter, migration: &Migration) -> Result<()> {
    let migration = migration.clone();

    transaction(adapter, move |tx| {
        Box::pin(async move {
            for op in migration.down() {
                tx.revert_operation(op).await?;
            }
            tx.record_rolled_back_migration(migration.id()).await
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, applied: bool) -> StatusEntry {
        StatusEntry {
            id: id.to_string(),
            description: format!("migration {}", id),
            applied,
        }
    }

    #[test]
    fn test_status_report_display() {
        let report = StatusReport {
            backend: Backend::SQLite,
            entries: vec![entry("001", true), entry("002", false)],
            orphaned: vec![],
        };
        let text = report.to_string();
        assert!(text.starts_with("Migration status (sqlite)"));
        assert!(text.contains("001 | applied | migration 001"));
        assert!(text.contains("002 | pending | migration 002"));
        assert!(text.ends_with("1 applied, 1 pending"));
    }

    #[test]
    fn test_status_report_lists_orphans() {
        let report = StatusReport {
            backend: Backend::Postgres,
            entries: vec![entry("001", true)],
            orphaned: vec!["000".to_string()],
        };
        assert!(report
            .to_string()
            .ends_with("Orphaned ledger entries: 000"));
        assert_eq!(report.pending_count(), 0);
    }
}
