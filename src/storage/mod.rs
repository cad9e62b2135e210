//! Storage subsystem for warehousedb
//!
//! The relational side of the system: table definitions, native values and
//! the engine that executes table operations.
//!
//! # Design Principles
//!
//! - Engines accept compiled column definitions and return rows
//! - Constraints (NOT NULL, UNIQUE, PRIMARY KEY) are enforced by the engine
//! - Deferred defaults are never evaluated here

mod engine;
mod errors;
mod memory;
mod table;
mod value;

pub use engine::{KeyFilter, Page, StorageEngine};
pub use errors::{StorageError, StorageResult};
pub use memory::MemoryEngine;
pub use table::{ColumnDefault, ColumnSpec, StorageType, TableDef};
pub use value::{DbValue, Row};
