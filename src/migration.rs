//! Versioned migration records
//!
//! A [`Migration`] pairs an ordered list of up operations with the
//! author-supplied down operations that undo them. Migrations are usually
//! built in code, but can also be stored as JSON files named
//! `{id}_{name}.json` and loaded with [`load_migrations`].

use crate::error::{Error, Result};
use crate::operation::{Operation, OperationKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// A named, ordered pair of up/down operation lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    up: Vec<Operation>,
    #[serde(default)]
    down: Vec<Operation>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
}

/// On-disk shape of a migration file; the id comes from the filename
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrationFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    up: Vec<Operation>,
    #[serde(default)]
    down: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
}

impl Migration {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        up: Vec<Operation>,
        down: Vec<Operation>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            up,
            down,
            created_at: Utc::now(),
            checksum: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Attach the expected checksum; see [`verify_checksum`](Self::verify_checksum)
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn up(&self) -> &[Operation] {
        &self.up
    }

    pub fn down(&self) -> &[Operation] {
        &self.down
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Hex SHA-256 over the id and both operation lists
    pub fn compute_checksum(&self) -> String {
        let canonical = json!({
            "id": self.id,
            "up": self.up,
            "down": self.down,
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        format!("{:x}", digest)
    }

    /// Compare the attached checksum (if any) against the current content
    pub fn verify_checksum(&self) -> Result<()> {
        match &self.checksum {
            Some(expected) if *expected != self.compute_checksum() => {
                Err(Error::invalid_migration(format!(
                    "migration {} checksum mismatch: expected {}, computed {}",
                    self.id,
                    expected,
                    self.compute_checksum()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Load a migration from a `{id}_{name}.json` file
    pub fn from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let path = file_path.as_ref();
        let content = fs::read_to_string(path)?;

        let filename = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::invalid_migration("invalid migration filename"))?;

        let (id, name) = filename.split_once('_').ok_or_else(|| {
            Error::invalid_migration(format!(
                "migration filename must follow format {{id}}_{{name}}.json: {}",
                filename
            ))
        })?;

        let file: MigrationFile = serde_json::from_str(&content)?;

        Ok(Migration {
            id: id.to_string(),
            description: file
                .description
                .unwrap_or_else(|| name.replace('_', " ")),
            up: file.up,
            down: file.down,
            created_at: parse_timestamp(id).unwrap_or_else(Utc::now),
            checksum: file.checksum,
        })
    }

    /// Generate a new migration id from the current UTC time
    pub fn generate_id() -> String {
        Utc::now().format(ID_FORMAT).to_string()
    }

    /// Write an empty migration file and return its path
    pub fn create_template(name: &str, migrations_dir: impl AsRef<Path>) -> Result<PathBuf> {
        if name.trim().is_empty() {
            return Err(Error::invalid_migration("migration name cannot be empty"));
        }
        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == ' ' || c == '-')
        {
            return Err(Error::invalid_migration(
                "migration name can only contain letters, numbers, spaces, hyphens, and underscores",
            ));
        }

        let id = Self::generate_id();
        let filename = format!("{}_{}.json", id, name.replace(' ', "_").to_lowercase());
        let file_path = migrations_dir.as_ref().join(filename);

        let template = MigrationFile {
            description: Some(name.to_string()),
            up: Vec::new(),
            down: Vec::new(),
            checksum: None,
        };

        fs::create_dir_all(migrations_dir.as_ref())?;
        fs::write(&file_path, serde_json::to_string_pretty(&template)?)?;

        Ok(file_path)
    }
}

/// Parse a `YYYYMMDDHHMMSS` migration id into a timestamp
fn parse_timestamp(id: &str) -> Option<DateTime<Utc>> {
    if id.len() != 14 {
        return None;
    }
    NaiveDateTime::parse_from_str(id, ID_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Load every `.json` migration in `dir`, sorted by id
///
/// A file that fails to parse aborts the load, so a later migration can
/// never be applied ahead of a broken earlier one.
pub fn load_migrations(dir: impl AsRef<Path>) -> Result<Vec<Migration>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut migrations = Vec::new();
    for entry in fs::read_dir(dir)? {
        let file_path = entry?.path();
        if file_path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let migration = Migration::from_file(&file_path).map_err(|e| {
            Error::invalid_migration(format!("{}: {}", file_path.display(), e))
        })?;
        migrations.push(migration);
    }

    migrations.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(migrations)
}

/// Validation result for a migration set
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid_count: usize,
    pub total_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Check a migration set for problems the manager would not catch by itself
pub fn validate_migrations(migrations: &[Migration]) -> ValidationResult {
    let mut result = ValidationResult {
        total_count: migrations.len(),
        ..ValidationResult::default()
    };

    let mut id_count: HashMap<&str, usize> = HashMap::new();
    for migration in migrations {
        *id_count.entry(migration.id()).or_insert(0) += 1;
    }

    for migration in migrations {
        let mut has_errors = false;

        if id_count.get(migration.id()).copied().unwrap_or(0) > 1 {
            result
                .errors
                .push(format!("Migration {} has duplicate ID", migration.id()));
            has_errors = true;
        }

        if migration.up().is_empty() {
            result
                .errors
                .push(format!("Migration {} has no up operations", migration.id()));
            has_errors = true;
        }

        if let Err(e) = migration.verify_checksum() {
            result.errors.push(e.to_string());
            has_errors = true;
        }

        if migration.down().is_empty() {
            result.warnings.push(format!(
                "Migration {} has no down operations - rollback will not be possible",
                migration.id()
            ));
        }

        for op in migration.up() {
            if op.kind() != OperationKind::AlterTable {
                continue;
            }
            for column in op.columns() {
                if column.required && column.default.is_none() && !column.auto_increment {
                    result.warnings.push(format!(
                        "Migration {} adds required column {}.{} without a default",
                        migration.id(),
                        op.table_name(),
                        column.name
                    ));
                }
            }
        }

        if !has_errors {
            result.valid_count += 1;
        }
    }

    result
}
