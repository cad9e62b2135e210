//! Schema subsystem for warehousedb
//!
//! Compiles user-declared warehouse schemas into the three representations
//! the rest of the system works with: a storage table definition, an item
//! validator and an item serializer.
//!
//! # Design Principles
//!
//! - Closed type catalog; unknown types are rejected
//! - Deferred defaults are named, checked at definition, evaluated per row
//! - At most one compilation per warehouse name
//! - Compiled artifacts are immutable and shared by `Arc`

mod defaults;
mod errors;
mod field;
mod item;
mod registry;
mod types;

pub use defaults::{deferred_token, parse_deferred_token, DefaultRegistry, DefaultSpec, Producer};
pub use errors::{IssueKind, SchemaError, SchemaResult, ValidationIssue};
pub use field::{check_name, compile as compile_field, is_valid_name, FieldDefinition, FIELD_KEYS};
pub use item::{FieldRule, ItemSerializer, ItemValidator, ValidatedItem};
pub use registry::{
    CompiledArtifacts, SchemaRegistry, WarehouseSchema, CREATED_AT_FIELD, SURROGATE_KEY_FIELD,
};
pub use types::{json_type_name, native_kind_of, resolve as resolve_type, storage_type_of, NativeKind, ScalarType, TypeRef};
