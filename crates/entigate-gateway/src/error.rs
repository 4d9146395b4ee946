//! Error handling for the gateway.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Internal server error.
    Internal(String),
    /// Bad request.
    BadRequest(String),
    /// A backend engine failed or timed out.
    Backend(String),
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Backend(msg) => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR", msg),
        };
        error!(status = status.as_u16(), code, %message, "request failed");

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<entigate_core::Error> for AppError {
    fn from(err: entigate_core::Error) -> Self {
        use entigate_core::Error;

        match err {
            Error::InvalidArgument(_) | Error::UnknownEntityType(_) | Error::AttributeNotFound(_) => {
                AppError::BadRequest(err.to_string())
            }
            Error::Backend(_) | Error::Timeout(_) => AppError::Backend(err.to_string()),
            Error::Unsupported(_) | Error::Internal(_) | Error::Protocol(_) => AppError::Internal(err.to_string()),
        }
    }
}
