//! API request handlers

pub mod ai;
pub mod auth;
pub mod campaigns;
pub mod health;
pub mod provider_events;
pub mod segments;
pub mod tracking;

use axum::http::StatusCode;
use axum::Json;
use sentra_common::Error;
use serde::Serialize;
use tracing::error;

/// Error response body shared across all endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Handler error type: status plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error onto its HTTP shape
pub fn error_response(err: Error) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: err.code().to_ascii_lowercase(),
            message: err.to_string(),
        }),
    )
}

/// Log a database error and return an opaque 500
pub fn db_error(context: &str, err: sqlx::Error) -> ApiError {
    error!("{}: {}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal_error".to_string(),
            message: context.to_string(),
        }),
    )
}

/// A 422 validation error
pub fn validation_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: "validation_error".to_string(),
            message: message.into(),
        }),
    )
}

/// A 404 for a missing owned resource
pub fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not_found".to_string(),
            message: message.into(),
        }),
    )
}
