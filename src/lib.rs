//! warehousedb - declare record types at runtime, store typed items
//!
//! A warehouse is declared with a JSON field schema. The schema registry
//! compiles it once into a storage table definition, an item validator and
//! an item serializer; the warehouse manager creates the physical table and
//! routes item payloads through the compiled contract.

pub mod cli;
pub mod http_server;
pub mod observability;
pub mod schema;
pub mod storage;
pub mod warehouse;
