//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code.

use thiserror::Error;

use crate::observability::ObservabilityError;
use crate::schema::SchemaError;
use crate::storage::StorageError;
use crate::warehouse::WarehouseError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Boot failed: {0}")]
    BootFailed(String),

    #[error(transparent)]
    Logging(#[from] ObservabilityError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

impl CliError {
    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        CliError::Config(msg.into())
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        CliError::BootFailed(msg.into())
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "CLI_CONFIG_ERROR",
            CliError::Io(_) => "CLI_IO_ERROR",
            CliError::Json(_) => "CLI_JSON_ERROR",
            CliError::BootFailed(_) => "CLI_BOOT_FAILED",
            CliError::Logging(_) => "CLI_LOGGING_ERROR",
            CliError::Schema(err) => err.code(),
            CliError::Storage(err) => err.code(),
            CliError::Warehouse(err) => err.code(),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
