//! # HTTP Server Module
//!
//! Axum API over the warehouse manager.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/v1/warehouses` - Declare, list, inspect and delete warehouses
//! - `/v1/warehouses/:name/items` - Item CRUD
//! - `/v1/items/schemas` - Item schemas by item name

pub mod config;
pub mod errors;
pub mod routes;
pub mod server;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use routes::{api_routes, health_routes, ApiState};
pub use server::HttpServer;
