//! In-memory storage engine with optional JSON snapshot persistence
//!
//! Rows are stored positionally against their table's column arena. When a
//! snapshot path is configured, every mutation rewrites the snapshot file
//! (write to a temporary file, fsync, rename) while the table lock is held.
//! A mutation whose snapshot write fails is undone before the error returns.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::engine::{KeyFilter, Page, StorageEngine};
use super::errors::{StorageError, StorageResult};
use super::table::{ColumnDefault, TableDef};
use super::value::{DbValue, Row};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableData {
    def: TableDef,
    rows: Vec<Vec<DbValue>>,
    next_serial: i64,
}

impl TableData {
    fn new(def: TableDef) -> Self {
        Self {
            def,
            rows: Vec::new(),
            next_serial: 1,
        }
    }

    fn to_row(&self, values: &[DbValue]) -> Row {
        self.def
            .column_names()
            .zip(values.iter())
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn check_columns<'a>(&self, names: impl Iterator<Item = &'a String>) -> StorageResult<()> {
        for name in names {
            if self.def.position(name).is_none() {
                return Err(StorageError::ColumnNotFound {
                    table: self.def.name().to_string(),
                    column: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn filter_position(&self, filter: &KeyFilter) -> StorageResult<usize> {
        self.def
            .position(&filter.column)
            .ok_or_else(|| StorageError::ColumnNotFound {
                table: self.def.name().to_string(),
                column: filter.column.clone(),
            })
    }

    fn check_not_null(&self, values: &[DbValue]) -> StorageResult<()> {
        for (col, value) in self.def.columns().iter().zip(values) {
            if value.is_null() && !col.nullable {
                return Err(StorageError::NotNullViolation {
                    table: self.def.name().to_string(),
                    column: col.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Checks `candidate` against every stored row except `skip`.
    fn check_unique(&self, candidate: &[DbValue], skip: Option<usize>) -> StorageResult<()> {
        let others = self
            .rows
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != skip)
            .map(|(_, row)| row);

        let pk: Vec<usize> = self
            .def
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(idx, _)| idx)
            .collect();

        for other in others {
            for (idx, col) in self.def.columns().iter().enumerate() {
                let single_key = col.primary_key && pk.len() == 1;
                if !(col.unique || single_key) || candidate[idx].is_null() {
                    continue;
                }
                if candidate[idx] == other[idx] {
                    return Err(StorageError::UniqueViolation {
                        table: self.def.name().to_string(),
                        column: col.name.clone(),
                    });
                }
            }
            if pk.len() > 1 && pk.iter().all(|&idx| candidate[idx] == other[idx]) {
                let names: Vec<&str> = pk
                    .iter()
                    .map(|&idx| self.def.columns()[idx].name.as_str())
                    .collect();
                return Err(StorageError::UniqueViolation {
                    table: self.def.name().to_string(),
                    column: names.join(","),
                });
            }
        }
        Ok(())
    }
}

/// Table engine backed by process memory.
pub struct MemoryEngine {
    tables: RwLock<BTreeMap<String, TableData>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryEngine {
    /// Creates an empty, purely in-memory engine.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            snapshot_path: None,
        }
    }

    /// Opens an engine persisted at `path`.
    ///
    /// A missing snapshot file starts an empty engine; the file is created on
    /// the first mutation.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                StorageError::snapshot(path.display().to_string(), format!("Failed to read: {}", e))
            })?;
            let tables: BTreeMap<String, TableData> = serde_json::from_str(&content).map_err(|e| {
                StorageError::snapshot(path.display().to_string(), format!("Invalid JSON: {}", e))
            })?;
            info!(path = %path.display(), tables = tables.len(), "Loaded storage snapshot");
            tables
        } else {
            info!(path = %path.display(), "No storage snapshot found, starting empty");
            BTreeMap::new()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// Snapshot file location, if persistence is enabled.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> StorageResult<usize> {
        let tables = self.read();
        tables
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, TableData>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, TableData>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, tables: &BTreeMap<String, TableData>) -> StorageResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let shown = path.display().to_string();

        let json = serde_json::to_vec(tables)
            .map_err(|e| StorageError::snapshot(&shown, format!("Failed to encode: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::snapshot(&shown, format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let tmp = path.with_extension("tmp");
        let mut file = File::create(&tmp)
            .map_err(|e| StorageError::snapshot(&shown, format!("Failed to create: {}", e)))?;
        file.write_all(&json)
            .map_err(|e| StorageError::snapshot(&shown, format!("Failed to write: {}", e)))?;
        file.sync_all()
            .map_err(|e| StorageError::snapshot(&shown, format!("Failed to fsync: {}", e)))?;
        fs::rename(&tmp, path)
            .map_err(|e| StorageError::snapshot(&shown, format!("Failed to rename: {}", e)))?;

        debug!(path = %shown, bytes = json.len(), "Storage snapshot written");
        Ok(())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryEngine {
    fn create_table(&self, def: &TableDef) -> StorageResult<()> {
        let mut tables = self.write();
        if tables.contains_key(def.name()) {
            return Err(StorageError::TableExists(def.name().to_string()));
        }
        tables.insert(def.name().to_string(), TableData::new(def.clone()));
        if let Err(err) = self.persist(&tables) {
            tables.remove(def.name());
            return Err(err);
        }
        debug!(table = def.name(), columns = def.len(), "Created table");
        Ok(())
    }

    fn create_table_if_not_exists(&self, def: &TableDef) -> StorageResult<bool> {
        match self.create_table(def) {
            Ok(()) => Ok(true),
            Err(StorageError::TableExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn drop_table(&self, name: &str) -> StorageResult<()> {
        let mut tables = self.write();
        let removed = tables
            .remove(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))?;
        if let Err(err) = self.persist(&tables) {
            tables.insert(name.to_string(), removed);
            return Err(err);
        }
        debug!(table = name, "Dropped table");
        Ok(())
    }

    fn table_exists(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    fn table_def(&self, name: &str) -> StorageResult<TableDef> {
        self.read()
            .get(name)
            .map(|t| t.def.clone())
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    fn insert(&self, table: &str, mut row: Row) -> StorageResult<Row> {
        let mut tables = self.write();
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        data.check_columns(row.keys())?;

        let mut next_serial = data.next_serial;
        let mut values = Vec::with_capacity(data.def.len());
        for col in data.def.columns() {
            let value = match row.remove(&col.name) {
                Some(DbValue::Null) | None if col.autoincrement => {
                    let serial = next_serial;
                    next_serial += 1;
                    DbValue::Integer(serial)
                }
                Some(value) => value,
                None => match &col.default {
                    ColumnDefault::Literal(value) => value.clone(),
                    _ => DbValue::Null,
                },
            };
            if col.autoincrement {
                if let DbValue::Integer(v) = value {
                    next_serial = next_serial.max(v.saturating_add(1));
                }
            }
            values.push(value);
        }

        data.check_not_null(&values)?;
        data.check_unique(&values, None)?;

        let previous_serial = data.next_serial;
        data.next_serial = next_serial;
        let stored = data.to_row(&values);
        data.rows.push(values);
        if let Err(err) = self.persist(&tables) {
            if let Some(data) = tables.get_mut(table) {
                data.rows.pop();
                data.next_serial = previous_serial;
            }
            return Err(err);
        }
        Ok(stored)
    }

    fn select(&self, table: &str, filter: Option<&KeyFilter>, page: Page) -> StorageResult<Vec<Row>> {
        let tables = self.read();
        let data = tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;

        let position = filter.map(|f| data.filter_position(f)).transpose()?;

        Ok(data
            .rows
            .iter()
            .filter(|values| match (position, filter) {
                (Some(idx), Some(f)) => values[idx] == f.value,
                _ => true,
            })
            .skip(page.offset)
            .take(page.limit)
            .map(|values| data.to_row(values))
            .collect())
    }

    fn update(&self, table: &str, filter: &KeyFilter, changes: Row) -> StorageResult<Vec<Row>> {
        let mut tables = self.write();
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        data.check_columns(changes.keys())?;
        let position = data.filter_position(filter)?;

        let matching: Vec<usize> = data
            .rows
            .iter()
            .enumerate()
            .filter(|(_, values)| values[position] == filter.value)
            .map(|(idx, _)| idx)
            .collect();

        let mut updated = Vec::with_capacity(matching.len());
        for &idx in &matching {
            let mut values = data.rows[idx].clone();
            for (name, value) in &changes {
                if let Some(pos) = data.def.position(name) {
                    values[pos] = value.clone();
                }
            }
            data.check_not_null(&values)?;
            data.check_unique(&values, Some(idx))?;
            updated.push((idx, values));
        }

        let rows: Vec<Row> = updated.iter().map(|(_, values)| data.to_row(values)).collect();
        let previous: Vec<(usize, Vec<DbValue>)> = updated
            .into_iter()
            .map(|(idx, values)| (idx, std::mem::replace(&mut data.rows[idx], values)))
            .collect();
        if !previous.is_empty() {
            if let Err(err) = self.persist(&tables) {
                if let Some(data) = tables.get_mut(table) {
                    for (idx, values) in previous {
                        data.rows[idx] = values;
                    }
                }
                return Err(err);
            }
        }
        Ok(rows)
    }

    fn delete(&self, table: &str, filter: &KeyFilter) -> StorageResult<u64> {
        let mut tables = self.write();
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        let position = data.filter_position(filter)?;

        let before = std::mem::take(&mut data.rows);
        data.rows = before
            .iter()
            .filter(|values| values[position] != filter.value)
            .cloned()
            .collect();
        let removed = (before.len() - data.rows.len()) as u64;
        if removed > 0 {
            if let Err(err) = self.persist(&tables) {
                if let Some(data) = tables.get_mut(table) {
                    data.rows = before;
                }
                return Err(err);
            }
        }
        Ok(removed)
    }
}
