//! Authentication failure taxonomy
//!
//! The variant is the internal truth used for logs and metrics. What the
//! caller sees is decided in `crate::error` and stays generic.

use docent_core::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Email already registered
    #[error("Email already registered")]
    Conflict,

    /// Unknown email or wrong secret
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Access token past its expiry
    #[error("Token has expired")]
    Expired,

    /// Refresh token revoked, expired or never issued
    #[error("Refresh token is not live")]
    Revoked,

    /// Bad signature, unparsable token or missing claims
    #[error("Malformed token")]
    Malformed,

    /// Neither an access nor a refresh token was presented
    #[error("No credentials presented")]
    MissingCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Conflict => "conflict",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Expired => "expired",
            AuthError::Revoked => "revoked",
            AuthError::Malformed => "malformed",
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::Storage(e) if e.is_transient() => "storage_unavailable",
            AuthError::Storage(_) => "storage",
            AuthError::Internal(_) => "internal",
        }
    }

    /// Whether the caller made a mistake, as opposed to the service failing
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AuthError::Storage(_) | AuthError::Internal(_))
    }
}
