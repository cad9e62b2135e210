//! Storage engine error types
//!
//! Error codes:
//! - STORAGE_TABLE_EXISTS
//! - STORAGE_TABLE_NOT_FOUND
//! - STORAGE_COLUMN_NOT_FOUND
//! - STORAGE_NOT_NULL_VIOLATION
//! - STORAGE_UNIQUE_VIOLATION
//! - STORAGE_SNAPSHOT_ERROR

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage engine errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("NOT NULL constraint failed: {table}.{column}")]
    NotNullViolation { table: String, column: String },

    #[error("UNIQUE constraint failed: {table}.{column}")]
    UniqueViolation { table: String, column: String },

    #[error("Snapshot error ({path}): {reason}")]
    Snapshot { path: String, reason: String },
}

impl StorageError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::TableExists(_) => "STORAGE_TABLE_EXISTS",
            StorageError::TableNotFound(_) => "STORAGE_TABLE_NOT_FOUND",
            StorageError::ColumnNotFound { .. } => "STORAGE_COLUMN_NOT_FOUND",
            StorageError::NotNullViolation { .. } => "STORAGE_NOT_NULL_VIOLATION",
            StorageError::UniqueViolation { .. } => "STORAGE_UNIQUE_VIOLATION",
            StorageError::Snapshot { .. } => "STORAGE_SNAPSHOT_ERROR",
        }
    }

    /// Constraint violations are caused by the caller's data, not the engine.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StorageError::NotNullViolation { .. } | StorageError::UniqueViolation { .. }
        )
    }

    pub(crate) fn snapshot(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Snapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
