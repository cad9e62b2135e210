//! Table definitions accepted by the storage engine
//!
//! A `TableDef` is a column arena: columns are kept in declaration order and
//! addressed either by position or by name through a prebuilt index.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::value::DbValue;

/// Physical column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Integer,
    Varchar(u32),
    Text,
    Date,
    DateTime,
    Boolean,
    Json,
    Float,
}

impl StorageType {
    /// SQL spelling of the column type
    pub fn sql_name(&self) -> String {
        match self {
            StorageType::Integer => "INTEGER".to_string(),
            StorageType::Varchar(len) => format!("VARCHAR({})", len),
            StorageType::Text => "TEXT".to_string(),
            StorageType::Date => "DATE".to_string(),
            StorageType::DateTime => "DATETIME".to_string(),
            StorageType::Boolean => "BOOLEAN".to_string(),
            StorageType::Json => "JSON".to_string(),
            StorageType::Float => "FLOAT".to_string(),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// Column default as seen by the engine.
///
/// `Deferred` names a producer that the engine cannot evaluate; callers resolve
/// it before insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ColumnDefault {
    None,
    Literal(DbValue),
    Deferred(String),
}

impl ColumnDefault {
    pub fn is_none(&self) -> bool {
        matches!(self, ColumnDefault::None)
    }
}

/// Storage-ready description of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub storage_type: StorageType,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub index: bool,
    pub autoincrement: bool,
    pub default: ColumnDefault,
}

impl ColumnSpec {
    /// A nullable column with no constraints.
    pub fn new(name: impl Into<String>, storage_type: StorageType) -> Self {
        Self {
            name: name.into(),
            storage_type,
            nullable: true,
            unique: false,
            primary_key: false,
            index: false,
            autoincrement: false,
            default: ColumnDefault::None,
        }
    }

    /// Integer identity column used when a table declares no primary key.
    pub fn identity(name: impl Into<String>) -> Self {
        Self {
            nullable: false,
            primary_key: true,
            index: true,
            autoincrement: true,
            ..Self::new(name, StorageType::Integer)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    /// Value is produced by the engine when the caller omits it.
    pub fn is_server_generated(&self) -> bool {
        self.autoincrement
    }

    fn ddl(&self) -> String {
        let mut out = format!("\"{}\" {}", self.name, self.storage_type.sql_name());
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if self.unique && !self.primary_key {
            out.push_str(" UNIQUE");
        }
        if self.autoincrement {
            out.push_str(" AUTOINCREMENT");
        }
        if let ColumnDefault::Literal(value) = &self.default {
            out.push_str(&format!(" DEFAULT {}", literal_sql(value)));
        }
        out
    }
}

fn literal_sql(value: &DbValue) -> String {
    match value {
        DbValue::Null => "NULL".to_string(),
        DbValue::Integer(v) => v.to_string(),
        DbValue::Real(v) => v.to_string(),
        DbValue::Boolean(v) => if *v { "1" } else { "0" }.to_string(),
        DbValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
        DbValue::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        DbValue::Timestamp(v) => format!("'{}'", v.to_rfc3339()),
        DbValue::Json(v) => format!("'{}'", v.to_string().replace('\'', "''")),
        DbValue::Blob(v) => format!("X'{}'", v.iter().map(|b| format!("{:02X}", b)).collect::<String>()),
    }
}

#[derive(Serialize, Deserialize)]
struct RawTableDef {
    name: String,
    columns: Vec<ColumnSpec>,
}

/// A physical table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTableDef", into = "RawTableDef")]
pub struct TableDef {
    name: String,
    columns: Vec<ColumnSpec>,
    positions: HashMap<String, usize>,
}

impl From<RawTableDef> for TableDef {
    fn from(raw: RawTableDef) -> Self {
        TableDef::new(raw.name, raw.columns)
    }
}

impl From<TableDef> for RawTableDef {
    fn from(def: TableDef) -> Self {
        RawTableDef {
            name: def.name,
            columns: def.columns,
        }
    }
}

impl TableDef {
    /// Builds a table definition. Column names are assumed unique; a repeated
    /// name resolves to its first occurrence.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        let mut positions = HashMap::with_capacity(columns.len());
        for (idx, col) in columns.iter().enumerate() {
            positions.entry(col.name.clone()).or_insert(idx);
        }
        Self {
            name: name.into(),
            columns,
            positions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn column(&self, column: &str) -> Option<&ColumnSpec> {
        self.position(column).map(|idx| &self.columns[idx])
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn primary_key(&self) -> Vec<&ColumnSpec> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// The single key column used for item lookups (first primary-key column).
    pub fn key_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// `CREATE TABLE` statement followed by one `CREATE INDEX` per indexed
    /// non-key column.
    pub fn to_ddl(&self) -> String {
        let mut lines: Vec<String> = self.columns.iter().map(|c| format!("  {}", c.ddl())).collect();
        let pk: Vec<String> = self
            .primary_key()
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect();
        if !pk.is_empty() {
            lines.push(format!("  PRIMARY KEY ({})", pk.join(", ")));
        }
        let mut ddl = format!("CREATE TABLE \"{}\" (\n{}\n);", self.name, lines.join(",\n"));
        for col in self.columns.iter().filter(|c| c.index && !c.primary_key) {
            ddl.push_str(&format!(
                "\nCREATE INDEX \"ix_{}_{}\" ON \"{}\" (\"{}\");",
                self.name, col.name, self.name, col.name
            ));
        }
        ddl
    }
}
