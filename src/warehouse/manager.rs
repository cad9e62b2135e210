//! Warehouse lifecycle manager
//!
//! Owns the `warehouse` metadata table and the physical item tables built
//! from compiled schemas, and routes item payloads through each warehouse's
//! cached validator and serializer.
//!
//! Deleting a warehouse removes its metadata record only. The item table and
//! the compiled cache entry are left in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::{WarehouseError, WarehouseResult};
use crate::schema::{check_name, CompiledArtifacts, SchemaError, SchemaRegistry, WarehouseSchema};
use crate::storage::{
    ColumnSpec, DbValue, KeyFilter, Page, Row, StorageEngine, StorageError, StorageType, TableDef,
};

/// Metadata table holding one record per warehouse.
pub const METADATA_TABLE: &str = "warehouse";

/// Name no warehouse may take.
pub const RESERVED_NAME: &str = METADATA_TABLE;

const NAME_LENGTH: u32 = 255;

/// Definition of the metadata table.
pub fn metadata_table_def() -> TableDef {
    TableDef::new(
        METADATA_TABLE,
        vec![
            ColumnSpec::new("name", StorageType::Varchar(NAME_LENGTH)).primary_key(),
            ColumnSpec::new("item_name", StorageType::Varchar(NAME_LENGTH))
                .not_null()
                .unique(),
            ColumnSpec::new("item_schema", StorageType::Json).not_null(),
            ColumnSpec::new("created_at", StorageType::DateTime).not_null(),
        ],
    )
}

/// A declared warehouse as recorded in metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseHandle {
    pub name: String,
    pub item_name: String,
    pub item_schema: Value,
    pub created_at: DateTime<Utc>,
}

impl WarehouseHandle {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        let text = |column: &str| match row.get(column) {
            Some(DbValue::Text(v)) => Ok(v.clone()),
            other => Err(malformed(column, other)),
        };
        let item_schema = match row.get("item_schema") {
            Some(DbValue::Json(v)) => v.clone(),
            other => return Err(malformed("item_schema", other)),
        };
        let created_at = match row.get("created_at") {
            Some(DbValue::Timestamp(ts)) => *ts,
            other => return Err(malformed("created_at", other)),
        };
        Ok(Self {
            name: text("name")?,
            item_name: text("item_name")?,
            item_schema,
            created_at,
        })
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("name".into(), DbValue::from(self.name.as_str()));
        row.insert("item_name".into(), DbValue::from(self.item_name.as_str()));
        row.insert("item_schema".into(), DbValue::Json(self.item_schema.clone()));
        row.insert("created_at".into(), DbValue::Timestamp(self.created_at));
        row
    }

    pub fn to_schema(&self) -> WarehouseSchema {
        WarehouseSchema {
            name: self.name.clone(),
            item_name: self.item_name.clone(),
            fields: self.item_schema.clone(),
            created_at: Some(self.created_at),
        }
    }
}

fn malformed(column: &str, value: Option<&DbValue>) -> WarehouseError {
    WarehouseError::Schema(SchemaError::Serialization {
        field: column.to_string(),
        value: format!("{:?}", value),
        reason: "malformed warehouse metadata".to_string(),
    })
}

/// Orchestrates warehouses and their items over a storage engine.
pub struct WarehouseManager {
    engine: Arc<dyn StorageEngine>,
    registry: Arc<SchemaRegistry>,
}

impl WarehouseManager {
    pub fn new(engine: Arc<dyn StorageEngine>, registry: Arc<SchemaRegistry>) -> Self {
        Self { engine, registry }
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Warms the registry from persisted metadata and ensures the metadata
    /// table exists. Returns the number of schemas compiled.
    pub fn bootstrap(&self) -> WarehouseResult<usize> {
        let persisted: Vec<WarehouseSchema> = self
            .list(0, usize::MAX, true)?
            .iter()
            .map(WarehouseHandle::to_schema)
            .collect();
        let compiled = self.registry.preload(&persisted)?;
        if self.engine.create_table_if_not_exists(&metadata_table_def())? {
            info!(table = METADATA_TABLE, "created warehouse metadata table");
        }
        info!(warehouses = compiled, "warehouse registry ready");
        Ok(compiled)
    }

    /// Declares a new warehouse and creates its item table.
    pub fn create(&self, schema: WarehouseSchema) -> WarehouseResult<WarehouseHandle> {
        if schema.name == RESERVED_NAME {
            return Err(WarehouseError::ReservedName(schema.name));
        }
        check_name("warehouse", &schema.name)?;
        check_name("item", &schema.item_name)?;

        if let Some(existing) = self.find(&schema.name)? {
            return Err(WarehouseError::WarehouseExists {
                name: existing.name,
                created_at: Some(existing.created_at),
            });
        }
        // Deleted warehouses and in-flight creations stay cached.
        if self.registry.contains(&schema.name) {
            return Err(WarehouseError::WarehouseExists {
                name: schema.name,
                created_at: None,
            });
        }
        if self.find_by_item_name(&schema.item_name)?.is_some() {
            return Err(WarehouseError::ItemSchemaExists(schema.item_name));
        }

        let artifacts = self
            .registry
            .insert_new(&schema.name, &schema.item_name, &schema.fields)
            .map_err(|err| match err {
                SchemaError::AlreadyCompiled(name) => WarehouseError::WarehouseExists {
                    name,
                    created_at: None,
                },
                other => WarehouseError::Schema(other),
            })?;

        if let Err(err) = self.engine.create_table(&artifacts.table_def) {
            if !matches!(err, StorageError::TableExists(_)) {
                self.rollback(&schema.name);
            }
            return Err(err.into());
        }

        let handle = WarehouseHandle {
            name: schema.name.clone(),
            item_name: schema.item_name.clone(),
            item_schema: schema.fields.clone(),
            created_at: schema.created_at.unwrap_or_else(Utc::now),
        };
        let stored = match self.engine.insert(METADATA_TABLE, handle.to_row()) {
            Ok(row) => row,
            Err(err) => {
                self.rollback(&schema.name);
                return Err(match err {
                    StorageError::UniqueViolation { ref column, .. } if column == "item_name" => {
                        WarehouseError::ItemSchemaExists(schema.item_name)
                    }
                    StorageError::UniqueViolation { ref column, .. } if column == "name" => {
                        WarehouseError::WarehouseExists {
                            name: schema.name,
                            created_at: None,
                        }
                    }
                    other => other.into(),
                });
            }
        };

        info!(
            warehouse = %handle.name,
            item = %handle.item_name,
            columns = artifacts.table_def.len(),
            "created warehouse"
        );
        WarehouseHandle::from_row(&stored)
    }

    fn rollback(&self, name: &str) {
        match self.engine.drop_table(name) {
            Ok(()) => warn!(warehouse = name, "rolled back item table after failed creation"),
            Err(StorageError::TableNotFound(_)) => {}
            Err(err) => warn!(warehouse = name, error = %err, "failed to roll back item table"),
        }
    }

    /// Removes a warehouse's metadata record.
    pub fn delete(&self, name: &str) -> WarehouseResult<()> {
        let removed = self
            .engine
            .delete(METADATA_TABLE, &KeyFilter::new("name", name))
            .map_err(|err| match err {
                StorageError::TableNotFound(_) => WarehouseError::WarehouseNotFound(name.to_string()),
                other => other.into(),
            })?;
        if removed == 0 {
            return Err(WarehouseError::WarehouseNotFound(name.to_string()));
        }
        info!(warehouse = name, "deleted warehouse metadata; item table retained");
        Ok(())
    }

    pub fn get(&self, name: &str) -> WarehouseResult<WarehouseHandle> {
        self.find(name)?
            .ok_or_else(|| WarehouseError::WarehouseNotFound(name.to_string()))
    }

    /// Warehouses ordered by name.
    ///
    /// With `missing_ok`, an absent metadata table yields an empty list.
    pub fn list(&self, offset: usize, limit: usize, missing_ok: bool) -> WarehouseResult<Vec<WarehouseHandle>> {
        if !self.engine.table_exists(METADATA_TABLE) {
            if missing_ok {
                warn!(table = METADATA_TABLE, "metadata table missing, treating as empty");
                return Ok(Vec::new());
            }
            return Err(StorageError::TableNotFound(METADATA_TABLE.to_string()).into());
        }
        let mut handles = self
            .engine
            .select(METADATA_TABLE, None, Page::all())?
            .iter()
            .map(WarehouseHandle::from_row)
            .collect::<WarehouseResult<Vec<_>>>()?;
        handles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(handles.into_iter().skip(offset).take(limit).collect())
    }

    /// Item schema declared under `item_name`.
    pub fn item_schema(&self, item_name: &str) -> WarehouseResult<Value> {
        self.find_by_item_name(item_name)?
            .map(|h| h.item_schema)
            .ok_or_else(|| WarehouseError::ItemSchemaNotFound(item_name.to_string()))
    }

    /// Every item schema keyed by item name.
    pub fn item_schemas(&self) -> WarehouseResult<BTreeMap<String, Value>> {
        Ok(self
            .list(0, usize::MAX, true)?
            .into_iter()
            .map(|h| (h.item_name, h.item_schema))
            .collect())
    }

    /// Compiled artifacts for an existing warehouse, compiling on first use.
    pub fn artifacts(&self, name: &str) -> WarehouseResult<Arc<CompiledArtifacts>> {
        let handle = self.get(name)?;
        let artifacts = self
            .registry
            .get_or_compile(&handle.name, &handle.item_name, &handle.item_schema)?;
        Ok(artifacts)
    }

    pub fn create_item(&self, warehouse: &str, payload: &Value) -> WarehouseResult<Map<String, Value>> {
        let artifacts = self.artifacts(warehouse)?;
        let item = artifacts.validator.validate(payload)?;
        let row = artifacts.validator.to_storage_row(&item)?;
        let stored = self.engine.insert(artifacts.table_def.name(), row)?;
        debug!(warehouse, "created item");
        Ok(artifacts.serializer.from_storage_row(&stored, None, None)?)
    }

    pub fn get_item(
        &self,
        warehouse: &str,
        key: &str,
        field_names: Option<&[String]>,
    ) -> WarehouseResult<Map<String, Value>> {
        let artifacts = self.artifacts(warehouse)?;
        if let Some(names) = field_names {
            artifacts.serializer.check_fields(names)?;
        }
        let filter = artifacts.serializer.key_filter(key)?;
        let row = self
            .engine
            .select_one(artifacts.table_def.name(), &filter)?
            .ok_or_else(|| item_not_found(warehouse, key))?;
        Ok(artifacts.serializer.from_storage_row(&row, field_names, None)?)
    }

    pub fn list_items(
        &self,
        warehouse: &str,
        offset: usize,
        limit: usize,
        field_names: Option<&[String]>,
    ) -> WarehouseResult<Vec<Map<String, Value>>> {
        let artifacts = self.artifacts(warehouse)?;
        if let Some(names) = field_names {
            artifacts.serializer.check_fields(names)?;
        }
        let rows = self
            .engine
            .select(artifacts.table_def.name(), None, Page::new(offset, limit))?;
        rows.iter()
            .map(|row| {
                artifacts
                    .serializer
                    .from_storage_row(row, field_names, None)
                    .map_err(WarehouseError::from)
            })
            .collect()
    }

    pub fn update_item(&self, warehouse: &str, key: &str, payload: &Value) -> WarehouseResult<Map<String, Value>> {
        let artifacts = self.artifacts(warehouse)?;
        let changes = artifacts.validator.validate_partial(payload)?;
        let filter = artifacts.serializer.key_filter(key)?;
        let updated = self
            .engine
            .update(artifacts.table_def.name(), &filter, changes.into_row())?;
        let row = updated
            .first()
            .ok_or_else(|| item_not_found(warehouse, key))?;
        debug!(warehouse, key, "updated item");
        Ok(artifacts.serializer.from_storage_row(row, None, None)?)
    }

    pub fn delete_item(&self, warehouse: &str, key: &str) -> WarehouseResult<()> {
        let artifacts = self.artifacts(warehouse)?;
        let filter = artifacts.serializer.key_filter(key)?;
        if self.engine.delete(artifacts.table_def.name(), &filter)? == 0 {
            return Err(item_not_found(warehouse, key));
        }
        debug!(warehouse, key, "deleted item");
        Ok(())
    }

    fn find(&self, name: &str) -> WarehouseResult<Option<WarehouseHandle>> {
        self.find_by("name", name)
    }

    fn find_by_item_name(&self, item_name: &str) -> WarehouseResult<Option<WarehouseHandle>> {
        self.find_by("item_name", item_name)
    }

    fn find_by(&self, column: &str, value: &str) -> WarehouseResult<Option<WarehouseHandle>> {
        if !self.engine.table_exists(METADATA_TABLE) {
            return Ok(None);
        }
        self.engine
            .select_one(METADATA_TABLE, &KeyFilter::new(column, value))?
            .as_ref()
            .map(WarehouseHandle::from_row)
            .transpose()
    }
}

fn item_not_found(warehouse: &str, key: &str) -> WarehouseError {
    WarehouseError::ItemNotFound {
        warehouse: warehouse.to_string(),
        key: key.to_string(),
    }
}
