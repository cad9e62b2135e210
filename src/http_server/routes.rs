//! Warehouse and Item HTTP Routes
//!
//! Endpoints for declaring warehouses and managing their items.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::config::HttpServerConfig;
use super::errors::{ApiError, ApiResult};
use crate::schema::WarehouseSchema;
use crate::warehouse::{WarehouseHandle, WarehouseManager, WarehouseResult};

// ==================
// Shared State
// ==================

/// State shared across handlers
pub struct ApiState {
    pub manager: Arc<WarehouseManager>,
    pub config: HttpServerConfig,
}

impl ApiState {
    pub fn new(manager: Arc<WarehouseManager>, config: HttpServerConfig) -> Self {
        Self { manager, config }
    }
}

/// Runs a manager call on the blocking pool.
async fn blocking<T, F>(state: &ApiState, f: F) -> ApiResult<T>
where
    F: FnOnce(&WarehouseManager) -> WarehouseResult<T> + Send + 'static,
    T: Send + 'static,
{
    let manager = Arc::clone(&state.manager);
    tokio::task::spawn_blocking(move || f(&manager))
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Comma-separated field names
    #[serde(default)]
    pub field_names: Option<String>,
}

impl PageQuery {
    fn field_names(&self) -> Option<Vec<String>> {
        parse_field_names(self.field_names.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldQuery {
    #[serde(default)]
    pub field_names: Option<String>,
}

/// Splits `a,b` into names; blank input means no selection.
pub fn parse_field_names(raw: Option<&str>) -> Option<Vec<String>> {
    let names: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ==================
// Routes
// ==================

/// Create warehouse and item routes
pub fn api_routes(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/warehouses", get(list_warehouses_handler).post(create_warehouse_handler))
        .route(
            "/warehouses/:name",
            get(get_warehouse_handler).delete(delete_warehouse_handler),
        )
        .route(
            "/warehouses/:name/items",
            get(list_items_handler).post(create_item_handler),
        )
        .route(
            "/warehouses/:name/items/:pk",
            get(get_item_handler)
                .put(update_item_handler)
                .delete(delete_item_handler),
        )
        .route("/items/schemas", get(item_schemas_handler))
        .route("/items/:item_name/schema", get(item_schema_handler))
        .with_state(state)
}

/// Health check route
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

// ==================
// Warehouse Handlers
// ==================

async fn create_warehouse_handler(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<WarehouseHandle>)> {
    let mut schema: WarehouseSchema =
        serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    schema.created_at = None;
    let handle = blocking(&state, move |m| m.create(schema)).await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

async fn list_warehouses_handler(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<WarehouseHandle>>> {
    let offset = query.offset.unwrap_or(0);
    let limit = state.config.page_limit(query.limit);
    let handles = blocking(&state, move |m| m.list(offset, limit, true)).await?;
    Ok(Json(handles))
}

async fn get_warehouse_handler(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<WarehouseHandle>> {
    let handle = blocking(&state, move |m| m.get(&name)).await?;
    Ok(Json(handle))
}

async fn delete_warehouse_handler(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |m| m.delete(&name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn item_schemas_handler(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<BTreeMap<String, Value>>> {
    let schemas = blocking(&state, |m| m.item_schemas()).await?;
    Ok(Json(schemas))
}

async fn item_schema_handler(
    State(state): State<Arc<ApiState>>,
    Path(item_name): Path<String>,
) -> ApiResult<Json<Value>> {
    let schema = blocking(&state, move |m| m.item_schema(&item_name)).await?;
    Ok(Json(schema))
}

// ==================
// Item Handlers
// ==================

async fn create_item_handler(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<(StatusCode, Json<Map<String, Value>>)> {
    let item = blocking(&state, move |m| m.create_item(&name, &payload)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn list_items_handler(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Map<String, Value>>>> {
    let offset = query.offset.unwrap_or(0);
    let limit = state.config.page_limit(query.limit);
    let fields = query.field_names();
    let items = blocking(&state, move |m| {
        m.list_items(&name, offset, limit, fields.as_deref())
    })
    .await?;
    Ok(Json(items))
}

async fn get_item_handler(
    State(state): State<Arc<ApiState>>,
    Path((name, pk)): Path<(String, String)>,
    Query(query): Query<FieldQuery>,
) -> ApiResult<Json<Map<String, Value>>> {
    let fields = parse_field_names(query.field_names.as_deref());
    let item = blocking(&state, move |m| m.get_item(&name, &pk, fields.as_deref())).await?;
    Ok(Json(item))
}

async fn update_item_handler(
    State(state): State<Arc<ApiState>>,
    Path((name, pk)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Map<String, Value>>> {
    let item = blocking(&state, move |m| m.update_item(&name, &pk, &payload)).await?;
    Ok(Json(item))
}

async fn delete_item_handler(
    State(state): State<Arc<ApiState>>,
    Path((name, pk)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |m| m.delete_item(&name, &pk)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_names() {
        assert_eq!(
            parse_field_names(Some("name, age,,")),
            Some(vec!["name".to_string(), "age".to_string()])
        );
        assert_eq!(parse_field_names(Some(" , ")), None);
        assert_eq!(parse_field_names(None), None);
    }

    #[test]
    fn test_health_response_serialization() {
        let json = serde_json::to_value(HealthResponse { status: "ok" }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }
}
