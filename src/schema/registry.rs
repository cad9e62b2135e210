//! Schema registry
//!
//! Compiles warehouse schemas into storage table definitions, item
//! validators and item serializers, and caches the result per warehouse
//! name for the lifetime of the registry.
//!
//! Rules:
//! - A name is compiled at most once; later requests return the cached entry
//! - Cached entries are never invalidated or replaced
//! - Compile-and-insert runs under the cache write lock

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::defaults::{DefaultRegistry, DefaultSpec};
use super::errors::{SchemaError, SchemaResult};
use super::field::{self, FieldDefinition};
use super::item::{FieldRule, ItemSerializer, ItemValidator};
use super::types::ScalarType;
use crate::storage::{ColumnDefault, ColumnSpec, StorageType, TableDef};

/// Implicit creation timestamp column appended to every item table.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Surrogate key column synthesized when no primary key is declared.
pub const SURROGATE_KEY_FIELD: &str = "id";

/// Producer backing the creation timestamp.
const CREATED_AT_PRODUCER: &str = "utcnow";

/// A warehouse declaration as submitted and as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSchema {
    pub name: String,
    pub item_name: String,
    /// Field name → raw field definition
    #[serde(rename = "item_schema")]
    pub fields: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl WarehouseSchema {
    pub fn new(name: impl Into<String>, item_name: impl Into<String>, fields: Value) -> Self {
        Self {
            name: name.into(),
            item_name: item_name.into(),
            fields,
            created_at: None,
        }
    }
}

/// Cached compilation output for one warehouse.
#[derive(Debug)]
pub struct CompiledArtifacts {
    pub warehouse_name: String,
    pub item_name: String,
    pub fields: Vec<FieldDefinition>,
    pub table_def: TableDef,
    pub validator: ItemValidator,
    pub serializer: ItemSerializer,
}

impl CompiledArtifacts {
    /// Name of the column items are addressed by.
    pub fn key_field(&self) -> Option<&str> {
        self.table_def.key_column().map(|c| c.name.as_str())
    }
}

/// Process-scoped cache of compiled warehouse schemas.
pub struct SchemaRegistry {
    defaults: Arc<DefaultRegistry>,
    cache: RwLock<HashMap<String, Arc<CompiledArtifacts>>>,
}

impl SchemaRegistry {
    pub fn new(defaults: Arc<DefaultRegistry>) -> Self {
        Self {
            defaults,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn defaults(&self) -> &Arc<DefaultRegistry> {
        &self.defaults
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CompiledArtifacts>>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CompiledArtifacts>>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached artifacts for `warehouse_name`, compiling `fields`
    /// first if the name is not cached yet. A cached entry wins over the
    /// supplied fields.
    pub fn get_or_compile(
        &self,
        warehouse_name: &str,
        item_name: &str,
        fields: &Value,
    ) -> SchemaResult<Arc<CompiledArtifacts>> {
        if let Some(hit) = self.get(warehouse_name) {
            return Ok(hit);
        }
        let mut cache = self.write();
        if let Some(hit) = cache.get(warehouse_name) {
            return Ok(Arc::clone(hit));
        }
        let artifacts = Arc::new(self.compile(warehouse_name, item_name, fields)?);
        cache.insert(warehouse_name.to_string(), Arc::clone(&artifacts));
        Ok(artifacts)
    }

    /// Compiles and caches a schema for a name that must not be cached yet.
    pub fn insert_new(
        &self,
        warehouse_name: &str,
        item_name: &str,
        fields: &Value,
    ) -> SchemaResult<Arc<CompiledArtifacts>> {
        let mut cache = self.write();
        if cache.contains_key(warehouse_name) {
            return Err(SchemaError::AlreadyCompiled(warehouse_name.to_string()));
        }
        let artifacts = Arc::new(self.compile(warehouse_name, item_name, fields)?);
        cache.insert(warehouse_name.to_string(), Arc::clone(&artifacts));
        Ok(artifacts)
    }

    pub fn get(&self, warehouse_name: &str) -> Option<Arc<CompiledArtifacts>> {
        self.read().get(warehouse_name).cloned()
    }

    pub fn contains(&self, warehouse_name: &str) -> bool {
        self.read().contains_key(warehouse_name)
    }

    /// Cached warehouse names, sorted.
    pub fn list_warehouse_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Compiles every persisted schema into the cache.
    ///
    /// Returns the number of schemas compiled by this call.
    pub fn preload<'a, I>(&self, schemas: I) -> SchemaResult<usize>
    where
        I: IntoIterator<Item = &'a WarehouseSchema>,
    {
        let mut compiled = 0;
        for schema in schemas {
            if self.contains(&schema.name) {
                continue;
            }
            self.get_or_compile(&schema.name, &schema.item_name, &schema.fields)?;
            compiled += 1;
        }
        debug!(compiled, "schema registry preloaded");
        Ok(compiled)
    }

    /// Compiles without touching the cache.
    pub fn compile(
        &self,
        warehouse_name: &str,
        item_name: &str,
        fields: &Value,
    ) -> SchemaResult<CompiledArtifacts> {
        field::check_name("warehouse", warehouse_name)?;
        field::check_name("item", item_name)?;

        let decls = fields.as_object().ok_or_else(|| {
            SchemaError::invalid_definition("$schema", "item schema must be an object of fields")
        })?;
        if decls.is_empty() {
            return Err(SchemaError::invalid_definition(
                "$schema",
                "item schema must declare at least one field",
            ));
        }

        // (1) compile every field
        let mut definitions = Vec::with_capacity(decls.len());
        let mut columns = Vec::with_capacity(decls.len() + 2);
        for (name, raw) in decls {
            let (definition, column) = field::compile(name, raw, &self.defaults)?;
            definitions.push(definition);
            columns.push(column);
        }

        // (2) collisions, including the implicit timestamp
        let mut seen = HashSet::with_capacity(columns.len() + 1);
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateField(column.name.clone()));
            }
        }
        if seen.contains(CREATED_AT_FIELD) {
            return Err(SchemaError::DuplicateField(CREATED_AT_FIELD.to_string()));
        }
        self.defaults.ensure(CREATED_AT_PRODUCER)?;

        // (3) surrogate key
        let keys: Vec<&str> = definitions
            .iter()
            .filter(|d| d.primary_key)
            .map(|d| d.name.as_str())
            .collect();
        let key_count = keys.len();
        if key_count > 1 {
            return Err(SchemaError::invalid_definition(
                "$schema",
                format!("at most one primary key field is supported, got {}", keys.join(", ")),
            ));
        }
        if key_count == 0 {
            if seen.contains(SURROGATE_KEY_FIELD) {
                return Err(SchemaError::DuplicateField(SURROGATE_KEY_FIELD.to_string()));
            }
            columns.insert(0, ColumnSpec::identity(SURROGATE_KEY_FIELD));
        } else if key_count == 1 {
            for (definition, column) in definitions.iter().zip(columns.iter_mut()) {
                if definition.primary_key
                    && definition.field_type == ScalarType::Integer
                    && definition.autoincrement.is_none()
                {
                    column.autoincrement = true;
                }
            }
        }
        columns.push(
            ColumnSpec::new(CREATED_AT_FIELD, StorageType::DateTime)
                .not_null()
                .with_default(ColumnDefault::Deferred(CREATED_AT_PRODUCER.to_string())),
        );

        // (4) table named after the warehouse
        let table_def = TableDef::new(warehouse_name, columns);

        // (5) validator over the item fields
        let mut rules: Vec<FieldRule> = definitions
            .iter()
            .map(|d| FieldRule {
                name: d.name.clone(),
                field_type: d.field_type,
                nullable: d.is_nullable(),
                primary_key: d.primary_key,
                server_generated: table_def
                    .column(&d.name)
                    .is_some_and(ColumnSpec::is_server_generated),
                writable: true,
                default: d.default.clone(),
            })
            .collect();
        if key_count == 0 {
            // Surrogate key: readable and immutable, never client supplied.
            rules.push(FieldRule {
                name: SURROGATE_KEY_FIELD.to_string(),
                field_type: ScalarType::Integer,
                nullable: false,
                primary_key: true,
                server_generated: true,
                writable: false,
                default: DefaultSpec::Unspecified,
            });
        }
        rules.push(FieldRule {
            name: CREATED_AT_FIELD.to_string(),
            field_type: ScalarType::DateTime,
            nullable: false,
            primary_key: false,
            server_generated: false,
            writable: true,
            default: DefaultSpec::Deferred(CREATED_AT_PRODUCER.to_string()),
        });
        let validator = ItemValidator::new(warehouse_name, rules, Arc::clone(&self.defaults));

        // (6) serializer over every stored column
        let serializer = ItemSerializer::new(&table_def);

        debug!(
            warehouse = warehouse_name,
            item = item_name,
            columns = table_def.len(),
            "compiled warehouse schema"
        );

        Ok(CompiledArtifacts {
            warehouse_name: warehouse_name.to_string(),
            item_name: item_name.to_string(),
            fields: definitions,
            table_def,
            validator,
            serializer,
        })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(Arc::new(DefaultRegistry::new()))
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("warehouses", &self.list_warehouse_names())
            .finish()
    }
}
