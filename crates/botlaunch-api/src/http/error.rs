//! Application error type mapping to HTTP status codes and the envelope
//! format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use botlaunch_types::error::{ProvisionError, StoreError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Store failure while reading or writing jobs/history.
    Store(StoreError),
    /// Provisioning failure (already normalized by the state machine).
    Provision(ProvisionError),
    /// Request validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

impl From<ProvisionError> for AppError {
    fn from(e: ProvisionError) -> Self {
        AppError::Provision(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Store(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                e.to_string(),
            ),
            AppError::Provision(ProvisionError::MissingAppPassword) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                ProvisionError::MissingAppPassword.to_string(),
            ),
            AppError::Provision(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROVISION_ERROR",
                e.to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
