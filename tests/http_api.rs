//! HTTP API Tests
//!
//! Drives the router in-process with `oneshot` requests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use warehousedb::http_server::{HttpServer, HttpServerConfig};
use warehousedb::schema::SchemaRegistry;
use warehousedb::storage::MemoryEngine;
use warehousedb::warehouse::WarehouseManager;

fn app() -> Router {
    let manager = WarehouseManager::new(Arc::new(MemoryEngine::new()), Arc::new(SchemaRegistry::default()));
    manager.bootstrap().unwrap();
    HttpServer::new(HttpServerConfig::default(), Arc::new(manager)).router()
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn payroll_body() -> Value {
    json!({
        "name": "payroll",
        "item_name": "employee",
        "item_schema": {
            "name": {"type": "string", "nullable": false},
            "age": {"type": "integer", "nullable": true, "default": -1},
            "salary": {"type": "integer", "nullable": false},
            "alive": {"type": "boolean", "nullable": false},
            "hire_date": {"type": "date", "nullable": false},
            "last_login": {"type": "datetime", "nullable": true, "default": "func:utcnow"}
        }
    })
}

async fn app_with_payroll() -> Router {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/v1/warehouses", Some(payroll_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    app
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

// =============================================================================
// Warehouses
// =============================================================================

#[tokio::test]
async fn test_create_and_get_warehouse() {
    let app = app();
    let (status, created) = send(&app, Method::POST, "/v1/warehouses", Some(payroll_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "payroll");
    assert_eq!(created["item_schema"], payroll_body()["item_schema"]);
    assert!(created["created_at"].is_string());

    let (status, fetched) = send(&app, Method::GET, "/v1/warehouses/payroll", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, listed) = send(&app, Method::GET, "/v1/warehouses", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_warehouse_conflicts() {
    let app = app_with_payroll().await;
    let (status, body) = send(&app, Method::POST, "/v1/warehouses", Some(payroll_body())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "WAREHOUSE_EXISTS");
    assert_eq!(body["status"], 409);
    assert!(body["error"].as_str().unwrap().contains("payroll"));
}

#[tokio::test]
async fn test_reserved_and_invalid_declarations() {
    let app = app();
    let mut reserved = payroll_body();
    reserved["name"] = json!("warehouse");
    let (status, body) = send(&app, Method::POST, "/v1/warehouses", Some(reserved)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "RESERVED_NAME");

    let bad_type = json!({
        "name": "things",
        "item_name": "thing",
        "item_schema": {"a": {"type": "decimal"}}
    });
    let (status, body) = send(&app, Method::POST, "/v1/warehouses", Some(bad_type)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FIELD_TYPE");
    assert_eq!(body["details"]["value"], "decimal");

    let (status, body) = send(&app, Method::POST, "/v1/warehouses", Some(json!({"name": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_delete_warehouse() {
    let app = app_with_payroll().await;
    let (status, body) = send(&app, Method::DELETE, "/v1/warehouses/payroll", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, Method::GET, "/v1/warehouses/payroll", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "WAREHOUSE_NOT_FOUND");
}

#[tokio::test]
async fn test_item_schema_routes() {
    let app = app_with_payroll().await;
    let (status, body) = send(&app, Method::GET, "/v1/items/employee/schema", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, payroll_body()["item_schema"]);

    let (status, body) = send(&app, Method::GET, "/v1/items/schemas", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("employee").is_some());

    let (status, body) = send(&app, Method::GET, "/v1/items/ghost/schema", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ITEM_SCHEMA_NOT_FOUND");
}

// =============================================================================
// Items
// =============================================================================

#[tokio::test]
async fn test_item_lifecycle() {
    let app = app_with_payroll().await;
    let joe = json!({"name": "Joe Bloggs", "salary": 123456, "alive": true, "hire_date": "2021-01-01"});

    let (status, created) = send(&app, Method::POST, "/v1/warehouses/payroll/items", Some(joe)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], 1);
    assert_eq!(created["age"], -1);

    let (status, fetched) = send(
        &app,
        Method::GET,
        "/v1/warehouses/payroll/items/1?field_names=name,salary",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, json!({"name": "Joe Bloggs", "salary": 123456}));

    let (status, updated) = send(
        &app,
        Method::PUT,
        "/v1/warehouses/payroll/items/1",
        Some(json!({"alive": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["alive"], false);

    let (status, listed) = send(&app, Method::GET, "/v1/warehouses/payroll/items?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, "/v1/warehouses/payroll/items/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, "/v1/warehouses/payroll/items/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ITEM_NOT_FOUND");
}

#[tokio::test]
async fn test_item_validation_details() {
    let app = app_with_payroll().await;
    let payload = json!({"name": "Joe Bloggs", "alive": true, "hire_date": "2021-01-01"});
    let (status, body) = send(&app, Method::POST, "/v1/warehouses/payroll/items", Some(payload)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["details"][0]["field_path"], "salary");
    assert_eq!(body["details"][0]["kind"], "missing");

    let (status, body) = send(&app, Method::GET, "/v1/warehouses/payroll/items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_unknown_field_names() {
    let app = app_with_payroll().await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/v1/warehouses/payroll/items?field_names=nonexistent",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FIELDS");
    assert_eq!(body["details"], json!(["nonexistent"]));
}

#[tokio::test]
async fn test_items_of_missing_warehouse() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/v1/warehouses/ghost/items", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "WAREHOUSE_NOT_FOUND");
}
