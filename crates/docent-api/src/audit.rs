//! Security audit logging for session events
//!
//! Every event is logged once at INFO on the `audit` target, with the full
//! event serialized as JSON in the `event` field so log shippers can route
//! it separately from application logs.
//!
//! Raw tokens and secrets never appear in an event.
//!
//! Author: hephaex@gmail.com

use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Where a request came from, as far as the headers tell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestOrigin {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: Uuid,
        email: String,
        #[serde(flatten)]
        origin: RequestOrigin,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        origin: RequestOrigin,
    },

    LoginSuccess {
        user_id: Uuid,
        email: String,
        #[serde(flatten)]
        origin: RequestOrigin,
    },

    /// `reason` is the internal failure kind; the client saw a generic error
    LoginFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        origin: RequestOrigin,
    },

    /// Refresh token exchanged at the refresh endpoint
    TokenRefresh {
        user_id: Uuid,
        #[serde(flatten)]
        origin: RequestOrigin,
    },

    /// Access token renewed by the boundary guard
    SessionRenewed {
        user_id: Uuid,
        path: String,
        rotated: bool,
        #[serde(flatten)]
        origin: RequestOrigin,
    },

    Logout {
        user_id: Option<Uuid>,
        revoked: u64,
        all_devices: bool,
        #[serde(flatten)]
        origin: RequestOrigin,
    },

    /// Invalid, expired or revoked token presented
    InvalidToken {
        reason: String,
        #[serde(flatten)]
        origin: RequestOrigin,
    },

    /// Protected route refused
    AccessDenied {
        path: String,
        reason: String,
        cleared_credentials: bool,
        #[serde(flatten)]
        origin: RequestOrigin,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::SessionRenewed { .. } => "Session renewed",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::AccessDenied { .. } => "Access denied",
        }
    }

    fn origin(&self) -> &RequestOrigin {
        match self {
            AuditEvent::RegistrationSuccess { origin, .. }
            | AuditEvent::RegistrationFailure { origin, .. }
            | AuditEvent::LoginSuccess { origin, .. }
            | AuditEvent::LoginFailure { origin, .. }
            | AuditEvent::TokenRefresh { origin, .. }
            | AuditEvent::SessionRenewed { origin, .. }
            | AuditEvent::Logout { origin, .. }
            | AuditEvent::InvalidToken { origin, .. }
            | AuditEvent::AccessDenied { origin, .. } => origin,
        }
    }
}

/// Log a security audit event
///
/// Example output with JSON logging enabled:
///
/// ```json
/// {
///   "timestamp": "2025-12-24T10:30:00Z",
///   "event": "{\"event_type\":\"login_success\",\"user_id\":\"550e8400-...\",...}",
///   "ip_address": "192.168.1.1",
///   "message": "Login successful"
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let origin = event.origin();

    info!(
        target: "audit",
        timestamp = %timestamp,
        event = %event_json,
        ip_address = ?origin.ip_address,
        user_agent = ?origin.user_agent,
        "{}",
        event.summary()
    );
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
