//! Crate-wide error type.
//!
//! Every layer (store, cache, safe browsing client, lookup pipeline,
//! blacklist loader) raises its own `thiserror` enum; this module
//! unifies them into the four semantic kinds spec'd for the HTTP
//! surface: `BadRequest`, `UpstreamUnavailable`, `StoreError`,
//! `ConfigError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified application error.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed JSON, missing `urls`, base64 decode failure, hash too short.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Any error from the Safe Browsing endpoints, or a non-2xx response.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Database or cache failure surfaced to a caller that cannot retry transparently.
    #[error("store error: {0}")]
    StoreError(String),

    /// Missing or invalid environment configuration at startup. Fatal.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<base64::DecodeError> for AppError {
    fn from(e: base64::DecodeError) -> Self {
        AppError::BadRequest(format!("invalid base64: {e}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::StoreError(format!("database error: {e}"))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::StoreError(format!("cache error: {e}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::UpstreamUnavailable(format!("safe browsing request failed: {e}"))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: u16,
    message: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            status: "error",
            error: ErrorDetail {
                code: status.as_u16(),
                message: self.to_string(),
            },
        };

        tracing::warn!(error = %body.error.message, code = body.error.code, "request failed");

        (status, Json(body)).into_response()
    }
}
