//! Schema error types
//!
//! Error codes:
//! - UNKNOWN_TYPE
//! - INVALID_FIELD_TYPE
//! - INVALID_FIELD_DEFINITION
//! - INVALID_NAME
//! - UNKNOWN_DEFAULT_FUNCTION
//! - DUPLICATE_FIELD
//! - ALREADY_COMPILED
//! - VALIDATION_FAILED
//! - INVALID_FIELDS
//! - SERIALIZATION_FAILED

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Category of a single item validation problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Payload is not a JSON object
    InvalidRoot,
    /// Required field absent
    Missing,
    /// Field not declared by the warehouse
    ExtraForbidden,
    /// Null supplied for a non-nullable field
    NullNotAllowed,
    /// Value cannot be coerced to the declared type
    TypeMismatch,
    /// Field may not be changed after creation
    Immutable,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::InvalidRoot => "invalid_root",
            IssueKind::Missing => "missing",
            IssueKind::ExtraForbidden => "extra_forbidden",
            IssueKind::NullNotAllowed => "null_not_allowed",
            IssueKind::TypeMismatch => "type_mismatch",
            IssueKind::Immutable => "immutable",
        }
    }
}

/// One field-level problem found while validating an item payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Field path (the field name, or `$root` for the payload itself)
    pub field_path: String,
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field_path: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_root(actual: &str) -> Self {
        Self::new(
            "$root",
            IssueKind::InvalidRoot,
            format!("expected an object, got {}", actual),
        )
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(field, IssueKind::Missing, "field required")
    }

    pub fn extra_field(field: impl Into<String>) -> Self {
        Self::new(field, IssueKind::ExtraForbidden, "extra fields not permitted")
    }

    pub fn null_value(field: impl Into<String>) -> Self {
        Self::new(field, IssueKind::NullNotAllowed, "value may not be null")
    }

    pub fn type_mismatch(field: impl Into<String>, expected: &str, detail: impl fmt::Display) -> Self {
        Self::new(
            field,
            IssueKind::TypeMismatch,
            format!("expected {}: {}", expected, detail),
        )
    }

    pub fn immutable(field: impl Into<String>) -> Self {
        Self::new(field, IssueKind::Immutable, "primary key may not be changed")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': {}", self.field_path, self.message)
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Schema compilation, validation and serialization errors
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid type {value} for field '{field}'")]
    InvalidFieldType { field: String, value: Value },

    #[error("Invalid definition for field '{field}': {reason}")]
    InvalidFieldDefinition { field: String, reason: String },

    #[error("Invalid {kind} name '{name}': must match ^[A-Za-z0-9_]+$")]
    InvalidName { kind: &'static str, name: String },

    #[error("Unknown default function '{name}' (available: {})", available.join(", "))]
    UnknownDefaultFunction { name: String, available: Vec<String> },

    #[error("Duplicate field '{0}' found, unable to create table")]
    DuplicateField(String),

    #[error("Schema for warehouse '{0}' is already compiled")]
    AlreadyCompiled(String),

    #[error("Item validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Invalid field names: {}", .0.join(", "))]
    InvalidFields(Vec<String>),

    #[error("Unable to serialize value {value} in field '{field}': {reason}")]
    Serialization {
        field: String,
        value: String,
        reason: String,
    },
}

impl SchemaError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::UnknownType(_) => "UNKNOWN_TYPE",
            SchemaError::InvalidFieldType { .. } => "INVALID_FIELD_TYPE",
            SchemaError::InvalidFieldDefinition { .. } => "INVALID_FIELD_DEFINITION",
            SchemaError::InvalidName { .. } => "INVALID_NAME",
            SchemaError::UnknownDefaultFunction { .. } => "UNKNOWN_DEFAULT_FUNCTION",
            SchemaError::DuplicateField(_) => "DUPLICATE_FIELD",
            SchemaError::AlreadyCompiled(_) => "ALREADY_COMPILED",
            SchemaError::Validation(_) => "VALIDATION_FAILED",
            SchemaError::InvalidFields(_) => "INVALID_FIELDS",
            SchemaError::Serialization { .. } => "SERIALIZATION_FAILED",
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            SchemaError::Validation(_) => 422,
            SchemaError::AlreadyCompiled(_) => 409,
            SchemaError::Serialization { .. } => 500,
            _ => 400,
        }
    }

    /// Structured detail for callers, where the message alone is not enough
    pub fn details(&self) -> Option<Value> {
        match self {
            SchemaError::Validation(issues) => serde_json::to_value(issues).ok(),
            SchemaError::InvalidFields(names) => Some(Value::from(names.clone())),
            SchemaError::InvalidFieldType { field, value } => {
                Some(serde_json::json!({ "field": field, "value": value }))
            }
            SchemaError::UnknownDefaultFunction { name, available } => {
                Some(serde_json::json!({ "name": name, "available": available }))
            }
            _ => None,
        }
    }

    pub(crate) fn invalid_definition(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidFieldDefinition {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field problems carried by a validation failure
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            SchemaError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
