//! Item validator and serializer
//!
//! Validation semantics:
//! - Payload must be an object
//! - No undeclared fields
//! - Null only where the field is nullable
//! - Values coerce to the declared type
//! - Non-nullable fields without a default are required
//!
//! Every problem in a payload is reported, not only the first.

use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::defaults::{DefaultRegistry, DefaultSpec};
use super::errors::{SchemaError, SchemaResult, ValidationIssue};
use super::types::{json_type_name, ScalarType};
use crate::storage::{DbValue, KeyFilter, Row, TableDef};

/// Compiled check for one writable item field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub name: String,
    pub field_type: ScalarType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Value is produced by storage when omitted.
    pub server_generated: bool,
    /// Accepted in creation payloads.
    pub writable: bool,
    pub default: DefaultSpec,
}

impl FieldRule {
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.server_generated && !self.default.is_specified()
    }
}

/// Payload that passed validation; holds only the fields the caller set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedItem {
    values: BTreeMap<String, DbValue>,
}

impl ValidatedItem {
    pub fn get(&self, field: &str) -> Option<&DbValue> {
        self.values.get(field)
    }

    pub fn is_set(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_row(self) -> Row {
        self.values
    }
}

/// Validates inbound item payloads for one warehouse.
#[derive(Debug, Clone)]
pub struct ItemValidator {
    warehouse: String,
    rules: Vec<FieldRule>,
    positions: HashMap<String, usize>,
    defaults: Arc<DefaultRegistry>,
}

impl ItemValidator {
    pub fn new(warehouse: impl Into<String>, rules: Vec<FieldRule>, defaults: Arc<DefaultRegistry>) -> Self {
        let positions = rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| (rule.name.clone(), idx))
            .collect();
        Self {
            warehouse: warehouse.into(),
            rules,
            positions,
            defaults,
        }
    }

    pub fn warehouse(&self) -> &str {
        &self.warehouse
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.positions.get(field).map(|idx| &self.rules[*idx])
    }

    /// Names of fields a creation payload must carry.
    pub fn required_fields(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.is_required())
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Validates a full item payload for creation.
    pub fn validate(&self, payload: &Value) -> SchemaResult<ValidatedItem> {
        let (item, mut issues) = self.check_values(payload, false);
        if let Some(obj) = payload.as_object() {
            for rule in self.rules.iter().filter(|r| r.is_required()) {
                if !obj.contains_key(&rule.name) {
                    issues.push(ValidationIssue::missing_field(&rule.name));
                }
            }
        }
        finish(item, issues)
    }

    /// Validates an update payload: present fields only, primary keys immutable.
    pub fn validate_partial(&self, payload: &Value) -> SchemaResult<ValidatedItem> {
        let (item, issues) = self.check_values(payload, true);
        finish(item, issues)
    }

    fn check_values(&self, payload: &Value, partial: bool) -> (ValidatedItem, Vec<ValidationIssue>) {
        let mut item = ValidatedItem::default();
        let mut issues = Vec::new();

        let obj = match payload.as_object() {
            Some(obj) => obj,
            None => {
                issues.push(ValidationIssue::invalid_root(json_type_name(payload)));
                return (item, issues);
            }
        };

        for (key, value) in obj {
            let rule = match self.rule(key) {
                Some(rule) => rule,
                None => {
                    issues.push(ValidationIssue::extra_field(key));
                    continue;
                }
            };
            if !partial && !rule.writable {
                issues.push(ValidationIssue::extra_field(key));
                continue;
            }
            if partial && rule.primary_key {
                issues.push(ValidationIssue::immutable(key));
                continue;
            }
            if value.is_null() {
                if rule.server_generated && !partial {
                    continue;
                }
                if rule.nullable {
                    item.values.insert(key.clone(), DbValue::Null);
                } else {
                    issues.push(ValidationIssue::null_value(key));
                }
                continue;
            }
            match rule.field_type.coerce(value) {
                Ok(native) => {
                    item.values.insert(key.clone(), native);
                }
                Err(detail) => {
                    issues.push(ValidationIssue::type_mismatch(key, rule.field_type.name(), detail));
                }
            }
        }

        (item, issues)
    }

    /// Storage row for a validated creation payload.
    ///
    /// Unset fields with a deferred default are resolved now; other unset
    /// fields are left out so storage-side defaults apply.
    pub fn to_storage_row(&self, item: &ValidatedItem) -> SchemaResult<Row> {
        let mut row = item.values.clone();
        let mut issues = Vec::new();
        for rule in &self.rules {
            if item.is_set(&rule.name) {
                continue;
            }
            if let DefaultSpec::Deferred(name) = &rule.default {
                match rule.field_type.conform(self.defaults.resolve(name)?) {
                    Ok(value) => {
                        row.insert(rule.name.clone(), value);
                    }
                    Err(detail) => {
                        issues.push(ValidationIssue::type_mismatch(&rule.name, rule.field_type.name(), detail));
                    }
                }
            }
        }
        if issues.is_empty() {
            Ok(row)
        } else {
            Err(SchemaError::Validation(issues))
        }
    }
}

fn finish(item: ValidatedItem, issues: Vec<ValidationIssue>) -> SchemaResult<ValidatedItem> {
    if issues.is_empty() {
        Ok(item)
    } else {
        Err(SchemaError::Validation(issues))
    }
}

/// Shapes stored rows into outbound item payloads for one warehouse.
#[derive(Debug, Clone)]
pub struct ItemSerializer {
    columns: Vec<(String, ScalarType)>,
    key: Option<(String, ScalarType)>,
}

impl ItemSerializer {
    /// Serializer covering every column of `table`.
    pub fn new(table: &TableDef) -> Self {
        let columns = table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), ScalarType::from_storage_type(c.storage_type)))
            .collect();
        let key = table
            .key_column()
            .map(|c| (c.name.clone(), ScalarType::from_storage_type(c.storage_type)));
        Self { columns, key }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Fails with `InvalidFields` naming exactly the unknown names.
    pub fn check_fields<S: AsRef<str>>(&self, names: &[S]) -> SchemaResult<()> {
        let unknown: Vec<String> = names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !self.columns.iter().any(|(col, _)| col.as_str() == *name))
            .map(str::to_string)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::InvalidFields(unknown))
        }
    }

    /// Equality filter on the key column for a key given as text.
    pub fn key_filter(&self, raw: &str) -> SchemaResult<KeyFilter> {
        let (name, key_type) = self
            .key
            .as_ref()
            .ok_or_else(|| SchemaError::invalid_definition("$key", "table has no primary key"))?;
        let value = key_type.coerce(&Value::String(raw.to_string())).map_err(|detail| {
            SchemaError::Validation(vec![ValidationIssue::type_mismatch(
                name.as_str(),
                key_type.name(),
                detail,
            )])
        })?;
        Ok(KeyFilter::new(name.as_str(), value))
    }

    /// Output payload for a stored row, in column order.
    ///
    /// `include` keeps only the named fields; `exclude` drops the named fields.
    pub fn from_storage_row(
        &self,
        row: &Row,
        include: Option<&[String]>,
        exclude: Option<&[String]>,
    ) -> SchemaResult<Map<String, Value>> {
        if let Some(names) = include {
            self.check_fields(names)?;
        }
        if let Some(names) = exclude {
            self.check_fields(names)?;
        }

        let mut out = Map::new();
        for (name, field_type) in &self.columns {
            if include.is_some_and(|names| !names.contains(name)) {
                continue;
            }
            if exclude.is_some_and(|names| names.contains(name)) {
                continue;
            }
            let value = match row.get(name) {
                Some(value) => render(name, *field_type, value)?,
                None => Value::Null,
            };
            out.insert(name.clone(), value);
        }
        Ok(out)
    }
}

fn render(field: &str, field_type: ScalarType, value: &DbValue) -> SchemaResult<Value> {
    let unrepresentable = |reason: &str| SchemaError::Serialization {
        field: field.to_string(),
        value: format!("{:?}", value),
        reason: reason.to_string(),
    };
    Ok(match value {
        DbValue::Null => Value::Null,
        DbValue::Integer(v) if field_type == ScalarType::Boolean => Value::Bool(*v != 0),
        DbValue::Integer(v) => Value::from(*v),
        DbValue::Real(v) => Number::from_f64(*v)
            .map(Value::Number)
            .ok_or_else(|| unrepresentable("non-finite float"))?,
        DbValue::Text(v) if field_type == ScalarType::Json => {
            serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.clone()))
        }
        DbValue::Text(v) => Value::String(v.clone()),
        DbValue::Boolean(v) => Value::Bool(*v),
        DbValue::Date(v) => Value::String(v.format("%Y-%m-%d").to_string()),
        DbValue::Timestamp(v) => Value::String(v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        DbValue::Json(v) => v.clone(),
        DbValue::Blob(_) => return Err(unrepresentable("binary data has no JSON form")),
    })
}
