//! Access token issuance and verification
//!
//! Access tokens are HMAC-SHA256 JWTs. They are never stored: validity is
//! decided by the signature, the required claims and the embedded expiry,
//! compared against the injected clock. Verification performs no I/O.

use chrono::{DateTime, Utc};
use docent_core::{AuthConfig, Clock};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// JWT Claims structure
///
/// These claims are embedded in the access token and extracted during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// JWT ID - unique token identifier
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// User's email address
    pub email: String,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// JWT token generation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),
}

/// Outcome of checking an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessVerdict {
    Valid(Claims),
    Expired,
    Malformed,
}

/// JWT Configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Access token expiration time in seconds (default: 900 = 15 minutes)
    pub access_expiration_secs: u64,
    /// Token issuer identifier
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_expiration_secs: config.access_ttl_secs,
            issuer: config.issuer.clone(),
        }
    }
}

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
    pub claims: Claims,
}

fn unix_secs(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

/// Sign an access token for `user_id`, valid from `now`
///
/// # Example
///
/// ```no_run
/// use docent_api::auth::jwt::{encode_access_token, JwtConfig};
/// use uuid::Uuid;
///
/// let token = encode_access_token(
///     &JwtConfig::default(),
///     Uuid::new_v4(),
///     "a@x.com",
///     chrono::Utc::now(),
/// ).expect("Failed to generate token");
/// ```
pub fn encode_access_token(
    config: &JwtConfig,
    user_id: Uuid,
    email: &str,
    now: DateTime<Utc>,
) -> Result<AccessToken, JwtError> {
    let iat = unix_secs(now);
    let exp = iat.saturating_add(config.access_expiration_secs);

    let claims = Claims {
        iss: config.issuer.clone(),
        sub: user_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat,
        exp,
        email: email.to_string(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(AccessToken {
        token,
        expires_in: config.access_expiration_secs,
        expires_at: i64::try_from(exp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(now),
        claims,
    })
}

/// Check signature, required claims and expiry of `token` at `now`
///
/// A token whose signature does not verify is `Malformed` even if its
/// embedded expiry has also passed.
pub fn verify_access_token(config: &JwtConfig, token: &str, now: DateTime<Utc>) -> AccessVerdict {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);
    // Expiry is compared below against the injected clock, without leeway
    validation.validate_exp = false;

    let claims = match decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            tracing::debug!(error = %e, "Access token rejected");
            return AccessVerdict::Malformed;
        }
    };

    if claims.user_id().is_none() {
        return AccessVerdict::Malformed;
    }
    if unix_secs(now) >= claims.exp {
        return AccessVerdict::Expired;
    }

    AccessVerdict::Valid(claims)
}

/// Stateless access token verifier bound to a secret and a clock
#[derive(Debug, Clone)]
pub struct AccessVerifier {
    config: JwtConfig,
    clock: Arc<dyn Clock>,
}

impl AccessVerifier {
    pub fn new(config: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn verify(&self, token: &str) -> AccessVerdict {
        verify_access_token(&self.config, token, self.clock.now())
    }
}
