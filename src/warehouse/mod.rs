//! Warehouse subsystem for warehousedb
//!
//! A warehouse is a user-declared record type together with the physical
//! table that stores its items.
//!
//! # Design Principles
//!
//! - Names are checked and reserved names refused before any compilation
//! - Compilation happens once, through the shared `SchemaRegistry`
//! - Physical table operations run outside the registry lock
//! - Failed creation drops the physical table; the cache entry stays

mod errors;
mod manager;

pub use errors::{WarehouseError, WarehouseResult};
pub use manager::{metadata_table_def, WarehouseHandle, WarehouseManager, METADATA_TABLE, RESERVED_NAME};
