//! Item Contract Tests
//!
//! Item payload behavior for compiled warehouses:
//! - Defaults are applied on creation
//! - Invalid payloads are rejected before anything is stored
//! - Every field type survives validation, storage and serialization
//! - Field selection rejects unknown names

use std::sync::Arc;

use serde_json::{json, Value};
use warehousedb::schema::{IssueKind, SchemaError, SchemaRegistry, WarehouseSchema};
use warehousedb::storage::MemoryEngine;
use warehousedb::warehouse::{WarehouseError, WarehouseManager};

fn manager_with(name: &str, item_name: &str, fields: Value) -> (Arc<MemoryEngine>, WarehouseManager) {
    let engine = Arc::new(MemoryEngine::new());
    let manager = WarehouseManager::new(engine.clone(), Arc::new(SchemaRegistry::default()));
    manager.bootstrap().unwrap();
    manager.create(WarehouseSchema::new(name, item_name, fields)).unwrap();
    (engine, manager)
}

fn payroll() -> (Arc<MemoryEngine>, WarehouseManager) {
    manager_with(
        "payroll",
        "employee",
        json!({
            "name": {"type": "string", "nullable": false},
            "age": {"type": "integer", "nullable": true, "default": -1},
            "salary": {"type": "integer", "nullable": false},
            "alive": {"type": "boolean", "nullable": false},
            "hire_date": {"type": "date", "nullable": false},
            "last_login": {"type": "datetime", "nullable": true, "default": "func:utcnow"}
        }),
    )
}

fn joe() -> Value {
    json!({
        "name": "Joe Bloggs",
        "salary": 123456,
        "alive": true,
        "hire_date": "2021-01-01"
    })
}

fn validation_issues(err: WarehouseError) -> Vec<(String, IssueKind)> {
    match err {
        WarehouseError::Schema(SchemaError::Validation(issues)) => {
            issues.into_iter().map(|i| (i.field_path, i.kind)).collect()
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

// =============================================================================
// Creation
// =============================================================================

#[test]
fn test_create_applies_defaults() {
    let (_engine, manager) = payroll();
    let item = manager.create_item("payroll", &joe()).unwrap();

    let keys: Vec<&str> = item.keys().map(String::as_str).collect();
    for key in ["id", "created_at", "name", "age", "salary", "alive", "hire_date", "last_login"] {
        assert!(keys.contains(&key), "missing {key}");
    }
    assert_eq!(item["id"], json!(1));
    assert_eq!(item["age"], json!(-1));
    assert_eq!(item["alive"], json!(true));
    assert_eq!(item["hire_date"], json!("2021-01-01"));
    assert!(item["last_login"].as_str().unwrap().ends_with('Z'));
    assert!(item["created_at"].is_string());
}

#[test]
fn test_missing_required_field_stores_nothing() {
    let (engine, manager) = payroll();
    let mut payload = joe();
    payload.as_object_mut().unwrap().remove("salary");

    let issues = validation_issues(manager.create_item("payroll", &payload).unwrap_err());
    assert_eq!(issues, vec![("salary".to_string(), IssueKind::Missing)]);
    assert_eq!(engine.row_count("payroll").unwrap(), 0);
}

#[test]
fn test_every_issue_is_reported() {
    let (_engine, manager) = payroll();
    let payload = json!({
        "name": null,
        "salary": "lots",
        "alive": true,
        "hire_date": "2021-01-01",
        "bonus": 10
    });
    let issues = validation_issues(manager.create_item("payroll", &payload).unwrap_err());
    assert!(issues.contains(&("name".to_string(), IssueKind::NullNotAllowed)));
    assert!(issues.contains(&("salary".to_string(), IssueKind::TypeMismatch)));
    assert!(issues.contains(&("bonus".to_string(), IssueKind::ExtraForbidden)));
}

#[test]
fn test_surrogate_key_is_not_accepted() {
    let (_engine, manager) = payroll();
    let mut payload = joe();
    payload["id"] = json!(42);
    let issues = validation_issues(manager.create_item("payroll", &payload).unwrap_err());
    assert_eq!(issues, vec![("id".to_string(), IssueKind::ExtraForbidden)]);
}

#[test]
fn test_uuid_default_is_fresh_per_item() {
    let (_engine, manager) = manager_with(
        "tickets",
        "ticket",
        json!({
            "ref": {"type": "string", "default": "func:uuid4"},
            "title": {"type": "text", "nullable": false}
        }),
    );
    let a = manager.create_item("tickets", &json!({"title": "a"})).unwrap();
    let b = manager.create_item("tickets", &json!({"title": "b"})).unwrap();
    let a_ref = a["ref"].as_str().unwrap();
    let b_ref = b["ref"].as_str().unwrap();
    assert_eq!(a_ref.len(), 36);
    assert_ne!(a_ref, b_ref);
}

#[test]
fn test_deferred_defaults_fit_their_field() {
    let (_engine, manager) = manager_with(
        "visits",
        "visit",
        json!({
            "day": {"type": "date", "default": "func:utcnow"},
            "at": {"type": "datetime", "default": "func:today"},
            "who": {"type": "text", "nullable": false}
        }),
    );
    let item = manager.create_item("visits", &json!({"who": "ann"})).unwrap();
    let day = item["day"].as_str().unwrap();
    assert_eq!(day.len(), 10, "expected a bare date, got {day}");
    assert!(item["at"].as_str().unwrap().ends_with("T00:00:00Z"));
}

#[test]
fn test_items_of_unknown_warehouse() {
    let (_engine, manager) = payroll();
    let err = manager.create_item("ghost", &joe()).unwrap_err();
    assert_eq!(err.code(), "WAREHOUSE_NOT_FOUND");
    assert_eq!(err.status_code(), 404);
}

// =============================================================================
// Types
// =============================================================================

#[test]
fn test_every_type_survives_storage() {
    let (_engine, manager) = manager_with(
        "kitchen",
        "sink",
        json!({
            "i": {"type": "integer"},
            "f": {"type": "float"},
            "s": {"type": "string"},
            "t": {"type": "text"},
            "b": {"type": "boolean"},
            "d": {"type": "date"},
            "dt": {"type": "datetime"},
            "j": {"type": "json"}
        }),
    );
    let payload = json!({
        "i": 7,
        "f": 2.5,
        "s": "short",
        "t": "long text",
        "b": false,
        "d": "2024-02-29",
        "dt": "2024-02-29T12:30:00Z",
        "j": {"tags": ["a", "b"], "n": 1}
    });
    let created = manager.create_item("kitchen", &payload).unwrap();
    let key = created["id"].to_string();
    let fetched = manager.get_item("kitchen", &key, None).unwrap();

    for (field, expected) in payload.as_object().unwrap() {
        assert_eq!(&fetched[field], expected, "field {field}");
    }
}

#[test]
fn test_lax_coercion_on_input() {
    let (_engine, manager) = manager_with(
        "lax",
        "entry",
        json!({
            "i": {"type": "integer"},
            "b": {"type": "boolean"},
            "dt": {"type": "datetime"}
        }),
    );
    let item = manager
        .create_item("lax", &json!({"i": "12", "b": "yes", "dt": 0}))
        .unwrap();
    assert_eq!(item["i"], json!(12));
    assert_eq!(item["b"], json!(true));
    assert_eq!(item["dt"], json!("1970-01-01T00:00:00Z"));
}

// =============================================================================
// Field Selection
// =============================================================================

#[test]
fn test_field_selection() {
    let (_engine, manager) = payroll();
    manager.create_item("payroll", &joe()).unwrap();

    let names = vec!["name".to_string(), "salary".to_string()];
    let item = manager.get_item("payroll", "1", Some(&names)).unwrap();
    assert_eq!(item.len(), 2);
    assert_eq!(item["name"], json!("Joe Bloggs"));

    let listed = manager.list_items("payroll", 0, 10, Some(&names)).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].len(), 2);
}

#[test]
fn test_unknown_field_names_rejected() {
    let (_engine, manager) = payroll();
    manager.create_item("payroll", &joe()).unwrap();
    let names = vec!["name".to_string(), "nonexistent".to_string()];

    for err in [
        manager.get_item("payroll", "1", Some(&names)).unwrap_err(),
        manager.list_items("payroll", 0, 10, Some(&names)).unwrap_err(),
    ] {
        match err {
            WarehouseError::Schema(SchemaError::InvalidFields(unknown)) => {
                assert_eq!(unknown, vec!["nonexistent".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

// =============================================================================
// Update and Delete
// =============================================================================

#[test]
fn test_update_changes_only_given_fields() {
    let (_engine, manager) = payroll();
    manager.create_item("payroll", &joe()).unwrap();

    let updated = manager
        .update_item("payroll", "1", &json!({"salary": 200000, "age": null}))
        .unwrap();
    assert_eq!(updated["salary"], json!(200000));
    assert_eq!(updated["age"], Value::Null);
    assert_eq!(updated["name"], json!("Joe Bloggs"));
}

#[test]
fn test_update_rejects_key_change() {
    let (_engine, manager) = payroll();
    manager.create_item("payroll", &joe()).unwrap();
    let issues = validation_issues(manager.update_item("payroll", "1", &json!({"id": 5})).unwrap_err());
    assert_eq!(issues, vec![("id".to_string(), IssueKind::Immutable)]);
}

#[test]
fn test_delete_then_missing() {
    let (_engine, manager) = payroll();
    manager.create_item("payroll", &joe()).unwrap();
    manager.delete_item("payroll", "1").unwrap();

    assert_eq!(manager.get_item("payroll", "1", None).unwrap_err().code(), "ITEM_NOT_FOUND");
    assert_eq!(manager.delete_item("payroll", "1").unwrap_err().code(), "ITEM_NOT_FOUND");
    assert_eq!(
        manager.update_item("payroll", "1", &json!({"salary": 1})).unwrap_err().code(),
        "ITEM_NOT_FOUND"
    );
}

#[test]
fn test_malformed_key_is_a_validation_error() {
    let (_engine, manager) = payroll();
    let err = manager.get_item("payroll", "abc", None).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_FAILED");
}

// =============================================================================
// Declared Keys
// =============================================================================

#[test]
fn test_declared_string_key() {
    let (engine, manager) = manager_with(
        "catalog",
        "product",
        json!({
            "sku": {"type": "string", "primary_key": true},
            "price": {"type": "float", "nullable": false}
        }),
    );
    let mut columns = engine_table(&engine, "catalog");
    columns.sort();
    assert_eq!(columns, vec!["created_at", "price", "sku"]);

    manager
        .create_item("catalog", &json!({"sku": "AB-1", "price": 9.5}))
        .unwrap();
    let item = manager.get_item("catalog", "AB-1", None).unwrap();
    assert_eq!(item["price"], json!(9.5));

    let err = manager
        .create_item("catalog", &json!({"sku": "AB-1", "price": 1.0}))
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let issues = validation_issues(manager.create_item("catalog", &json!({"price": 1.0})).unwrap_err());
    assert_eq!(issues, vec![("sku".to_string(), IssueKind::Missing)]);
}

fn engine_table(engine: &MemoryEngine, name: &str) -> Vec<String> {
    use warehousedb::storage::StorageEngine;
    engine
        .table_def(name)
        .unwrap()
        .column_names()
        .map(str::to_string)
        .collect()
}
