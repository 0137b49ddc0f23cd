//! API error handling
//!
//! Author: hephaex@gmail.com

use crate::auth::error::AuthError;
use crate::metrics::record_auth_failure;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Authentication required")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Validation(String),
    Auth(AuthError),
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Status and body for an auth failure
///
/// Client-facing messages stay generic: an unknown email and a wrong secret
/// are indistinguishable, and a revoked session looks like any other
/// missing one.
fn auth_error_response(err: &AuthError) -> (StatusCode, ApiError) {
    match err {
        AuthError::Conflict => (
            StatusCode::CONFLICT,
            ApiError::new("CONFLICT", "Email already registered"),
        ),
        AuthError::InvalidCredentials => (
            StatusCode::BAD_REQUEST,
            ApiError::new("INVALID_CREDENTIALS", "Invalid email or password"),
        ),
        AuthError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
        AuthError::Expired => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("TOKEN_EXPIRED", "Token has expired"),
        ),
        AuthError::Malformed => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("INVALID_TOKEN", "Invalid token"),
        ),
        AuthError::Revoked | AuthError::MissingCredentials => {
            (StatusCode::UNAUTHORIZED, ApiError::unauthorized())
        }
        AuthError::Storage(e) if e.is_transient() => (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::new("SERVICE_UNAVAILABLE", "Service temporarily unavailable"),
        ),
        AuthError::Storage(_) | AuthError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::internal_error(),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(&msg)),
            AppError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("VALIDATION_ERROR", "Request validation failed").with_details(details),
            ),
            AppError::Auth(err) => {
                record_auth_failure(err.kind());
                if err.is_client_error() {
                    tracing::warn!(kind = err.kind(), "Authentication failed");
                } else {
                    tracing::error!(kind = err.kind(), error = %err, "Authentication service failure");
                }
                auth_error_response(&err)
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
        };

        (status, Json(error)).into_response()
    }
}
