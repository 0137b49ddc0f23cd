//! Request and response bodies for the auth endpoints
//!
//! JSON field names are camelCase. `secret` also accepts `password`.

use chrono::{DateTime, Utc};
use docent_core::User;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::jwt::Claims;
use super::middleware::AuthenticatedUser;

/// User registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    /// Defaults to the local part of the email
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,

    #[serde(alias = "password")]
    #[validate(length(min = 6, max = 128))]
    pub secret: String,
}

impl RegisterRequest {
    pub fn display_name(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// User login request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    #[serde(alias = "password")]
    pub secret: String,
}

/// Token refresh request; the refresh cookie is used when the body omits it
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Logout request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Revoke every session of the token's owner
    #[serde(default)]
    pub all_devices: bool,
}

/// Access token verification request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
}

/// Tokens issued by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub access_expires_in: u64,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: Uuid,
}

/// Verified access token claims
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsView {
    pub user_id: String,
    pub email: String,
    pub issuer: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl From<Claims> for ClaimsView {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            issuer: claims.iss,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
    pub claims: ClaimsView,
}

/// Current user profile
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            created_at: user.created_at,
        }
    }
}

/// Identity attached to a request by the guard
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub user_id: Uuid,
    pub email: String,
}

impl From<&AuthenticatedUser> for IdentityView {
    fn from(user: &AuthenticatedUser) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProtectedDataResponse {
    pub message: String,
    pub user: IdentityView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_accepts_password_alias() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"secret1"}"#).unwrap();
        assert_eq!(req.secret, "secret1");
        assert_eq!(req.display_name(), "a");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_register_request_validation() {
        let bad_email: RegisterRequest =
            serde_json::from_str(r#"{"email":"nope","secret":"secret1"}"#).unwrap();
        assert!(bad_email.validate().is_err());

        let short: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@x.com","secret":"abc"}"#).unwrap();
        assert!(short.validate().is_err());

        let named: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@x.com","displayName":" Alice ","secret":"secret1"}"#,
        )
        .unwrap();
        assert!(named.validate().is_ok());
        assert_eq!(named.display_name(), "Alice");
    }

    #[test]
    fn test_token_response_is_camel_case() {
        let json = serde_json::to_value(TokenResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            access_expires_in: 900,
            token_type: "Bearer".into(),
        })
        .unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["accessExpiresIn"], 900);
    }

    #[test]
    fn test_logout_request_defaults() {
        let req: LogoutRequest = serde_json::from_str("{}").unwrap();
        assert!(req.refresh_token.is_none());
        assert!(!req.all_devices);
    }
}
