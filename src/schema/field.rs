//! Field definition compiler
//!
//! Turns one loosely typed field declaration into a normalized
//! `FieldDefinition` and the matching storage `ColumnSpec`.
//!
//! # Design Principles
//!
//! - Closed key set; unknown keys are rejected, never ignored
//! - Literal defaults are coerced once, here
//! - Deferred defaults are checked for existence and output type, never stored
//! - No I/O: the same input always compiles to the same output

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::defaults::{parse_deferred_token, DefaultRegistry, DefaultSpec};
use super::errors::{SchemaError, SchemaResult};
use super::types::ScalarType;
use crate::storage::ColumnSpec;

/// Keys accepted in a field declaration.
pub const FIELD_KEYS: [&str; 7] = [
    "type",
    "default",
    "nullable",
    "unique",
    "primary_key",
    "index",
    "autoincrement",
];

// Constant pattern, so construction cannot fail in practice; a failure
// would reject every name rather than accept unchecked ones.
static NAME_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// True if `name` matches `^[A-Za-z0-9_]+$`.
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

/// Fails with `InvalidName` unless `name` matches the name pattern.
pub fn check_name(kind: &'static str, name: &str) -> SchemaResult<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Normalized description of one item field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: ScalarType,
    /// `None` leaves the choice to the engine default.
    pub nullable: Option<bool>,
    pub unique: bool,
    pub primary_key: bool,
    pub index: bool,
    pub autoincrement: Option<bool>,
    pub default: DefaultSpec,
}

impl FieldDefinition {
    /// Nullability after applying the engine default.
    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(!self.primary_key)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_specified()
    }

    fn column_spec(&self) -> ColumnSpec {
        ColumnSpec {
            name: self.name.clone(),
            storage_type: self.field_type.storage_type(),
            nullable: self.is_nullable(),
            unique: self.unique,
            primary_key: self.primary_key,
            index: self.index || self.primary_key,
            autoincrement: self.autoincrement.unwrap_or(false),
            default: self.default.to_column_default(),
        }
    }
}

/// Compiles one field declaration.
pub fn compile(
    field_name: &str,
    raw: &Value,
    defaults: &DefaultRegistry,
) -> SchemaResult<(FieldDefinition, ColumnSpec)> {
    check_name("field", field_name)?;

    let decl = raw.as_object().ok_or_else(|| {
        SchemaError::invalid_definition(field_name, "field definition must be an object")
    })?;

    if let Some(key) = decl.keys().find(|k| !FIELD_KEYS.contains(&k.as_str())) {
        return Err(SchemaError::invalid_definition(
            field_name,
            format!("unknown key '{}'", key),
        ));
    }

    let raw_type = decl.get("type").cloned().unwrap_or(Value::Null);
    let field_type = ScalarType::resolve_value(&raw_type).map_err(|_| SchemaError::InvalidFieldType {
        field: field_name.to_string(),
        value: raw_type.clone(),
    })?;

    let nullable = flag(field_name, decl, "nullable")?;
    let unique = flag(field_name, decl, "unique")?.unwrap_or(false);
    let primary_key = flag(field_name, decl, "primary_key")?.unwrap_or(false);
    let index = flag(field_name, decl, "index")?.unwrap_or(false);
    let autoincrement = flag(field_name, decl, "autoincrement")?;

    if primary_key && nullable == Some(true) {
        return Err(SchemaError::invalid_definition(
            field_name,
            "a primary key cannot be nullable",
        ));
    }
    if autoincrement == Some(true) && field_type != ScalarType::Integer {
        return Err(SchemaError::invalid_definition(
            field_name,
            format!("autoincrement requires an integer field, not {}", field_type),
        ));
    }

    let deferred = match decl.get("default") {
        Some(Value::String(token)) => parse_deferred_token(token),
        _ => None,
    };
    let default = match (deferred, decl.get("default")) {
        (Some(name), _) => {
            // A sample value stands in for the producer's output kind.
            let sample = defaults.resolve(name)?;
            field_type.conform(sample).map_err(|reason| {
                SchemaError::invalid_definition(
                    field_name,
                    format!("default function '{}' does not produce a valid {}: {}", name, field_type, reason),
                )
            })?;
            DefaultSpec::Deferred(name.to_string())
        }
        (None, None | Some(Value::Null)) => DefaultSpec::Unspecified,
        (None, Some(literal)) => field_type
            .coerce(literal)
            .map(DefaultSpec::Literal)
            .map_err(|reason| {
                SchemaError::invalid_definition(
                    field_name,
                    format!("default is not a valid {}: {}", field_type, reason),
                )
            })?,
    };

    let definition = FieldDefinition {
        name: field_name.to_string(),
        field_type,
        nullable,
        unique,
        primary_key,
        index,
        autoincrement,
        default,
    };
    let column = definition.column_spec();
    Ok((definition, column))
}

fn flag(field: &str, decl: &Map<String, Value>, key: &str) -> SchemaResult<Option<bool>> {
    match decl.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(SchemaError::invalid_definition(
            field,
            format!("'{}' must be a boolean, got {}", key, other),
        )),
    }
}
