//! Session renewal coordinator
//!
//! Decides what to do with a request given whatever credentials it carried:
//!
//! ```text
//! nothing presented                      -> reject
//! access valid                           -> authenticated
//! access expired/absent, refresh live    -> issue new access (maybe rotate) -> renewed
//! access expired/absent, refresh dead    -> reject, clear both credentials
//! access expired/absent, no refresh      -> reject
//! ```
//!
//! Runs in-process from the guard; there is no HTTP hop to the refresh
//! endpoint.

use uuid::Uuid;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::issuer::TokenIssuer;
use super::jwt::{AccessToken, AccessVerdict, AccessVerifier};
use super::ledger::{IssuedRefreshToken, SessionLedger};
use super::middleware::AuthenticatedUser;
use std::sync::Arc;

/// Credentials read off an incoming request
#[derive(Debug, Clone, Default)]
pub struct PresentedCredentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl PresentedCredentials {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

#[derive(Debug)]
pub enum RenewalOutcome {
    /// The access token was valid as presented
    Authenticated(AuthenticatedUser),
    /// A new access token was minted from a live refresh token
    Renewed {
        user: AuthenticatedUser,
        access: AccessToken,
        /// Present when the refresh token was rotated as well
        refresh: Option<IssuedRefreshToken>,
    },
    /// The request cannot be authenticated
    Rejected {
        reason: AuthError,
        /// Whether the client should drop both stored credentials
        clear_credentials: bool,
    },
}

pub struct SessionRenewalCoordinator {
    verifier: AccessVerifier,
    issuer: TokenIssuer,
    ledger: SessionLedger,
    credentials: Arc<CredentialStore>,
    rotate_refresh: bool,
}

impl SessionRenewalCoordinator {
    pub fn new(
        verifier: AccessVerifier,
        issuer: TokenIssuer,
        ledger: SessionLedger,
        credentials: Arc<CredentialStore>,
        rotate_refresh: bool,
    ) -> Self {
        Self {
            verifier,
            issuer,
            ledger,
            credentials,
            rotate_refresh,
        }
    }

    /// Resolve `presented` to an identity, renewing the access token at most once
    ///
    /// `Err` is reserved for failures of the service itself (storage, or a
    /// freshly minted token that does not verify). Every client-side failure
    /// is a `Rejected` outcome.
    pub async fn resolve(
        &self,
        presented: &PresentedCredentials,
    ) -> Result<RenewalOutcome, AuthError> {
        if presented.is_empty() {
            return Ok(RenewalOutcome::Rejected {
                reason: AuthError::MissingCredentials,
                clear_credentials: false,
            });
        }

        let access_failure = match presented.access.as_deref().map(|t| self.verifier.verify(t)) {
            Some(AccessVerdict::Valid(claims)) => {
                return Ok(RenewalOutcome::Authenticated(AuthenticatedUser::from(claims)));
            }
            Some(AccessVerdict::Expired) => AuthError::Expired,
            Some(AccessVerdict::Malformed) => AuthError::Malformed,
            None => AuthError::MissingCredentials,
        };

        let Some(refresh_token) = presented.refresh.as_deref() else {
            return Ok(RenewalOutcome::Rejected {
                reason: access_failure,
                clear_credentials: false,
            });
        };

        let Some(credential) = self.ledger.find_live(refresh_token).await? else {
            return Ok(revoked());
        };

        let Some(user) = self.credentials.find(credential.user_id).await? else {
            return Ok(revoked());
        };

        let refresh = if self.rotate_refresh {
            match self.ledger.rotate(refresh_token, user.id).await? {
                Some(rotated) => Some(rotated),
                // A concurrent request spent the token first
                None => return Ok(revoked()),
            }
        } else {
            None
        };

        let access = self.issuer.issue_access(user.id, &user.email)?;
        let identity = self.confirm(&access, user.id)?;

        tracing::debug!(user_id = %user.id, rotated = refresh.is_some(), "Session renewed");

        Ok(RenewalOutcome::Renewed {
            user: identity,
            access,
            refresh,
        })
    }

    /// A token we just signed must verify; anything else is a server fault
    fn confirm(&self, access: &AccessToken, user_id: Uuid) -> Result<AuthenticatedUser, AuthError> {
        match self.verifier.verify(&access.token) {
            AccessVerdict::Valid(claims) if claims.user_id() == Some(user_id) => {
                Ok(AuthenticatedUser::from(claims))
            }
            other => {
                tracing::error!(verdict = ?other, "Freshly issued access token failed verification");
                Err(AuthError::Internal(
                    "issued access token failed verification".to_string(),
                ))
            }
        }
    }
}

fn revoked() -> RenewalOutcome {
    RenewalOutcome::Rejected {
        reason: AuthError::Revoked,
        clear_credentials: true,
    }
}
