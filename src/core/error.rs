//! Error types and handling for the chat stream server.
//!
//! This module provides a unified error type [`AppError`] for request handling
//! and implements the HTTP response conversion. Configuration errors live in
//! [`crate::core::config::ConfigError`] and provider errors in
//! [`crate::provider::ProviderError`].

use crate::provider::ProviderError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error type `type` field for client errors.
pub const ERROR_TYPE_INVALID_REQUEST: &str = "invalid_request_error";

/// Error type `type` field for upstream provider failures.
pub const ERROR_TYPE_PROVIDER: &str = "provider_error";

/// Error type `type` field for everything else.
pub const ERROR_TYPE_API: &str = "api_error";

/// Main error type for request handling.
#[derive(Error, Debug)]
pub enum AppError {
    /// Client provided invalid data (missing or blank message, bad JSON)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The generation provider failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Provider(ProviderError::Transport(e)) if e.is_timeout() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            AppError::Provider(ProviderError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error_type, message) = match self {
            AppError::BadRequest(msg) => (ERROR_TYPE_INVALID_REQUEST, msg),
            AppError::Provider(e) => {
                tracing::error!(error = %e, "Provider request failed");
                (ERROR_TYPE_PROVIDER, e.to_string())
            }
            AppError::Internal(msg) => (ERROR_TYPE_API, msg),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
