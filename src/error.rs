use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the migration engine
#[derive(Error, Debug)]
pub enum Error {
    /// Adapter is missing required connection fields
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown column type, operation kind, or a feature the backend cannot express
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Migration {id} failed to apply: {source}")]
    MigrationApply {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Migration {id} failed to revert: {source}")]
    MigrationRevert {
        id: String,
        #[source]
        source: Box<Error>,
    },

    /// Adapter does not provide a capability the engine depends on
    #[error("Adapter contract violation: {0}")]
    AdapterContract(String),

    #[error("Duplicate migration id: {0}")]
    DuplicateMigration(String),

    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    pub fn adapter_contract(msg: impl Into<String>) -> Self {
        Self::AdapterContract(msg.into())
    }

    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    pub fn document_store(msg: impl Into<String>) -> Self {
        Self::DocumentStore(msg.into())
    }

    pub fn apply(id: impl Into<String>, source: Error) -> Self {
        Self::MigrationApply {
            id: id.into(),
            source: Box::new(source),
        }
    }

    pub fn revert(id: impl Into<String>, source: Error) -> Self {
        Self::MigrationRevert {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Id of the migration this error is attached to, if any
    pub fn migration_id(&self) -> Option<&str> {
        match self {
            Error::MigrationApply { id, .. } | Error::MigrationRevert { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Get a stable error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "E_CONFIGURATION",
            Error::UnsupportedOperation(_) => "E_UNSUPPORTED_OPERATION",
            Error::MigrationApply { .. } => "E_MIGRATION_APPLY",
            Error::MigrationRevert { .. } => "E_MIGRATION_REVERT",
            Error::AdapterContract(_) => "E_ADAPTER_CONTRACT",
            Error::DuplicateMigration(_) => "E_DUPLICATE_MIGRATION",
            Error::InvalidMigration(_) => "E_INVALID_MIGRATION",
            Error::IndexNotFound(_) => "E_INDEX_NOT_FOUND",
            Error::DocumentStore(_) => "E_DOCUMENT_STORE",
            Error::Database(_) => "E_DATABASE",
            Error::Json(_) => "E_JSON",
            Error::Io(_) => "E_IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_error_carries_migration_id() {
        let err = Error::apply("001", Error::unsupported("column type BLOB"));
        assert_eq!(err.migration_id(), Some("001"));
        assert_eq!(err.error_code(), "E_MIGRATION_APPLY");
        assert!(err.to_string().contains("001"));
        assert!(err.to_string().contains("BLOB"));
    }

    #[test]
    fn test_plain_errors_have_no_migration_id() {
        let err = Error::configuration("missing host");
        assert_eq!(err.migration_id(), None);
        assert_eq!(err.error_code(), "E_CONFIGURATION");
    }
}
