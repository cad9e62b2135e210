//! # Warehouse Errors

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::schema::SchemaError;
use crate::storage::StorageError;

/// Result type for warehouse operations
pub type WarehouseResult<T> = Result<T, WarehouseError>;

fn created_suffix(created_at: &Option<DateTime<Utc>>) -> String {
    match created_at {
        Some(ts) => format!(" (created at {})", ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => String::new(),
    }
}

/// Warehouse lifecycle and item errors
#[derive(Debug, Clone, Error)]
pub enum WarehouseError {
    // ==================
    // Conflicts (409)
    // ==================
    #[error("Warehouse '{name}' already exists{}", created_suffix(created_at))]
    WarehouseExists {
        name: String,
        created_at: Option<DateTime<Utc>>,
    },

    #[error("Item schema '{0}' already exists")]
    ItemSchemaExists(String),

    // ==================
    // Client Errors (400)
    // ==================
    #[error("Warehouse name '{0}' is reserved")]
    ReservedName(String),

    // ==================
    // Not Found (404)
    // ==================
    #[error("Warehouse '{0}' not found")]
    WarehouseNotFound(String),

    #[error("Item schema '{0}' not found")]
    ItemSchemaNotFound(String),

    #[error("Item '{key}' not found in warehouse '{warehouse}'")]
    ItemNotFound { warehouse: String, key: String },

    // ==================
    // Layered
    // ==================
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WarehouseError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            WarehouseError::WarehouseExists { .. } => "WAREHOUSE_EXISTS",
            WarehouseError::ItemSchemaExists(_) => "ITEM_SCHEMA_EXISTS",
            WarehouseError::ReservedName(_) => "RESERVED_NAME",
            WarehouseError::WarehouseNotFound(_) => "WAREHOUSE_NOT_FOUND",
            WarehouseError::ItemSchemaNotFound(_) => "ITEM_SCHEMA_NOT_FOUND",
            WarehouseError::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            WarehouseError::Schema(err) => err.code(),
            WarehouseError::Storage(err) => err.code(),
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            WarehouseError::WarehouseExists { .. } | WarehouseError::ItemSchemaExists(_) => 409,
            WarehouseError::ReservedName(_) => 400,
            WarehouseError::WarehouseNotFound(_)
            | WarehouseError::ItemSchemaNotFound(_)
            | WarehouseError::ItemNotFound { .. } => 404,
            WarehouseError::Schema(err) => err.status_code(),
            WarehouseError::Storage(err) => match err {
                StorageError::TableNotFound(_) => 404,
                StorageError::TableExists(_) => 409,
                StorageError::ColumnNotFound { .. } => 400,
                err if err.is_constraint_violation() => 409,
                _ => 500,
            },
        }
    }

    /// Structured detail for callers
    pub fn details(&self) -> Option<Value> {
        match self {
            WarehouseError::WarehouseExists {
                name,
                created_at: Some(ts),
            } => Some(serde_json::json!({ "name": name, "created_at": ts })),
            WarehouseError::Schema(err) => err.details(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }
}
