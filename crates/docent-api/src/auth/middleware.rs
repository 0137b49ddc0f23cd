//! Session guard for protected routes
//!
//! Runs on every request. Public paths pass straight through. For protected
//! paths the guard reads the access token (Bearer header or access cookie)
//! and the refresh token (refresh cookie or `x-refresh-token`) and asks the
//! renewal coordinator what to do. A request carrying neither is refused
//! without touching storage.
//!
//! On success the identity is added to request extensions and can be
//! extracted in handlers:
//!
//! ```
//! use axum::Extension;
//! use docent_api::auth::middleware::AuthenticatedUser;
//!
//! async fn protected_handler(
//!     Extension(user): Extension<AuthenticatedUser>
//! ) -> String {
//!     format!("Hello, {}!", user.email)
//! }
//! ```

use super::jwt::Claims;
use super::renewal::{PresentedCredentials, RenewalOutcome};
use crate::audit::{audit_log, AuditEvent, RequestOrigin};
use crate::auth::cookies::RENEWED_ACCESS_HEADER;
use crate::error::AppError;
use crate::metrics::SESSIONS_RENEWED_TOTAL;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a verified request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    /// Id of the access token the identity came from
    pub jti: String,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            // Verified claims always carry a uuid subject
            user_id: claims.user_id().unwrap_or_else(Uuid::nil),
            email: claims.email,
            jti: claims.jti,
        }
    }
}

pub async fn session_guard(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if state.route_policy.is_public(&path) {
        return next.run(request).await;
    }

    let headers = request.headers();
    let presented = PresentedCredentials {
        access: state.cookies.access_token(headers),
        refresh: state.cookies.refresh_token(headers),
    };
    let origin = RequestOrigin::from_headers(headers);

    let outcome = match state.auth.resolve_session(&presented).await {
        Ok(outcome) => outcome,
        Err(e) => return AppError::from(e).into_response(),
    };

    match outcome {
        RenewalOutcome::Authenticated(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        RenewalOutcome::Renewed {
            user,
            access,
            refresh,
        } => {
            SESSIONS_RENEWED_TOTAL.inc();
            audit_log(&AuditEvent::SessionRenewed {
                user_id: user.user_id,
                path,
                rotated: refresh.is_some(),
                origin,
            });

            request.extensions_mut().insert(user);
            let mut response = next.run(request).await;

            let headers = response.headers_mut();
            state.cookies.set_tokens(
                headers,
                &access.token,
                refresh.as_ref().map(|r| r.token.as_str()),
            );
            if let Ok(value) = HeaderValue::from_str(&access.token) {
                headers.insert(RENEWED_ACCESS_HEADER, value);
            }
            response
        }
        RenewalOutcome::Rejected {
            reason,
            clear_credentials,
        } => {
            audit_log(&AuditEvent::AccessDenied {
                path,
                reason: reason.kind().to_string(),
                cleared_credentials: clear_credentials,
                origin,
            });

            let mut response = AppError::from(reason).into_response();
            if clear_credentials {
                state.cookies.clear_all(response.headers_mut());
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_user_from_claims() {
        let user_id = Uuid::new_v4();
        let claims = Claims {
            iss: "docent".to_string(),
            sub: user_id.to_string(),
            jti: "jti-1".to_string(),
            iat: 1000,
            exp: 2000,
            email: "test@example.com".to_string(),
        };

        let user = AuthenticatedUser::from(claims);

        assert_eq!(user.user_id, user_id);
        assert_eq!(user.email, "test@example.com");
        assert_eq!(user.jti, "jti-1");
    }
}
