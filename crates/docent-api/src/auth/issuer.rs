//! Token issuer
//!
//! Mints the short-lived access token (pure signing, no storage) and the
//! long-lived refresh token (recorded in the ledger).

use docent_core::{Clock, User};
use std::sync::Arc;
use uuid::Uuid;

use super::error::AuthError;
use super::jwt::{encode_access_token, AccessToken, JwtConfig};
use super::ledger::{IssuedRefreshToken, SessionLedger};

/// Access and refresh token minted together at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: AccessToken,
    pub refresh: IssuedRefreshToken,
}

#[derive(Clone)]
pub struct TokenIssuer {
    jwt: JwtConfig,
    clock: Arc<dyn Clock>,
    ledger: SessionLedger,
}

impl TokenIssuer {
    pub fn new(jwt: JwtConfig, clock: Arc<dyn Clock>, ledger: SessionLedger) -> Self {
        Self { jwt, clock, ledger }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.jwt.access_expiration_secs
    }

    pub fn issue_access(&self, user_id: Uuid, email: &str) -> Result<AccessToken, AuthError> {
        encode_access_token(&self.jwt, user_id, email, self.clock.now())
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    pub async fn issue_refresh(&self, user_id: Uuid) -> Result<IssuedRefreshToken, AuthError> {
        self.ledger.issue(user_id).await
    }

    pub async fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let access = self.issue_access(user.id, &user.email)?;
        let refresh = self.issue_refresh(user.id).await?;
        Ok(TokenPair { access, refresh })
    }
}
