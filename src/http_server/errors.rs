//! # HTTP Errors
//!
//! Maps subsystem errors to JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::warehouse::WarehouseError;

/// Result type for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid query parameter or body
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    /// Blocking task failed to complete
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Warehouse(err) => {
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Warehouse(err) => err.code(),
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<crate::schema::SchemaError> for ApiError {
    fn from(err: crate::schema::SchemaError) -> Self {
        ApiError::Warehouse(err.into())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code(),
            status: err.status_code().as_u16(),
            details: match err {
                ApiError::Warehouse(inner) => inner.details(),
                _ => None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaError, ValidationIssue};

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::BadRequest("limit".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(WarehouseError::WarehouseNotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("join".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_carries_details() {
        let err = ApiError::from(SchemaError::Validation(vec![ValidationIssue::missing_field("salary")]));
        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, "VALIDATION_FAILED");
        assert_eq!(body.status, 422);
        let details = body.details.unwrap();
        assert_eq!(details[0]["field_path"], "salary");
        assert_eq!(details[0]["kind"], "missing");
    }
}
