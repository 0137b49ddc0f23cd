//! Authentication service
//!
//! Wires the credential store, token issuer, ledger, verifier, renewal
//! coordinator and revocation handler together once at startup. Handlers
//! and the guard only talk to this type.

use docent_core::{AuthConfig, Clock, Storage, User};
use std::sync::Arc;
use uuid::Uuid;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::issuer::{TokenIssuer, TokenPair};
use super::jwt::{AccessToken, AccessVerdict, AccessVerifier, JwtConfig};
use super::ledger::{IssuedRefreshToken, SessionLedger};
use super::password::{PasswordConfig, SecretHasher};
use super::renewal::{PresentedCredentials, RenewalOutcome, SessionRenewalCoordinator};
use super::retry::RetryPolicy;
use super::revocation::{LogoutOutcome, RevocationHandler};

/// Tokens returned by a successful refresh
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access: AccessToken,
    pub refresh: IssuedRefreshToken,
}

pub struct AuthService {
    credentials: Arc<CredentialStore>,
    issuer: TokenIssuer,
    ledger: SessionLedger,
    verifier: AccessVerifier,
    renewal: SessionRenewalCoordinator,
    revocation: RevocationHandler,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        storage: &Storage,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let retry = RetryPolicy::from(config);
        let hasher = SecretHasher::new(PasswordConfig::from(config))
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let jwt = JwtConfig::from(config);

        let credentials = Arc::new(CredentialStore::new(
            storage.users(),
            hasher,
            clock.clone(),
            retry,
        ));
        let ledger = SessionLedger::new(
            storage.ledger(),
            clock.clone(),
            config.refresh_ttl_secs,
            retry,
        );
        let issuer = TokenIssuer::new(jwt.clone(), clock.clone(), ledger.clone());
        let verifier = AccessVerifier::new(jwt, clock);
        let renewal = SessionRenewalCoordinator::new(
            verifier.clone(),
            issuer.clone(),
            ledger.clone(),
            credentials.clone(),
            config.rotate_on_renewal,
        );
        let revocation = RevocationHandler::new(ledger.clone());

        Ok(Self {
            credentials,
            issuer,
            ledger,
            verifier,
            renewal,
            revocation,
        })
    }

    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> u64 {
        self.issuer.access_ttl_secs()
    }

    pub async fn register(
        &self,
        email: &str,
        display_name: &str,
        secret: &str,
    ) -> Result<User, AuthError> {
        let user = self.credentials.register(email, display_name, secret).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Verify the secret and open a new session
    pub async fn login(&self, email: &str, secret: &str) -> Result<(User, TokenPair), AuthError> {
        let user = self.credentials.verify(email, secret).await?;
        let tokens = self.issuer.issue_pair(&user).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user, tokens))
    }

    /// Exchange a live refresh token for a new access token and a rotated
    /// refresh token
    ///
    /// The presented token is spent. When several callers race with the same
    /// token, exactly one wins and the rest get `Revoked`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, AuthError> {
        let credential = self
            .ledger
            .find_live(refresh_token)
            .await?
            .ok_or(AuthError::Revoked)?;

        let user = self
            .credentials
            .find(credential.user_id)
            .await?
            .ok_or(AuthError::Revoked)?;

        let refresh = self
            .ledger
            .rotate(refresh_token, user.id)
            .await?
            .ok_or(AuthError::Revoked)?;

        let access = self.issuer.issue_access(user.id, &user.email)?;
        tracing::debug!(user_id = %user.id, "Tokens refreshed");

        Ok(RefreshedTokens { access, refresh })
    }

    pub async fn logout(
        &self,
        refresh_token: Option<&str>,
        all_devices: bool,
    ) -> Result<LogoutOutcome, AuthError> {
        self.revocation.logout(refresh_token, all_devices).await
    }

    /// Check an access token. No storage is touched.
    pub fn verify_access(&self, token: &str) -> AccessVerdict {
        self.verifier.verify(token)
    }

    /// Owner of a live refresh token
    pub async fn session_owner(&self, refresh_token: &str) -> Result<Uuid, AuthError> {
        self.ledger
            .find_live(refresh_token)
            .await?
            .map(|credential| credential.user_id)
            .ok_or(AuthError::Revoked)
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        self.credentials.find(user_id).await
    }

    /// Resolve the credentials carried by a request to be guarded
    pub async fn resolve_session(
        &self,
        presented: &PresentedCredentials,
    ) -> Result<RenewalOutcome, AuthError> {
        self.renewal.resolve(presented).await
    }

    /// Delete expired refresh tokens
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        self.ledger.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{test_auth_config, test_service};
    use chrono::Duration;
    use docent_core::ManualClock;

    #[tokio::test]
    async fn test_login_issues_verifiable_pair() {
        let (service, _clock) = test_service();
        let user = service.register("a@x.com", "Alice", "secret1").await.unwrap();

        let (logged_in, tokens) = service.login("a@x.com", "secret1").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        match service.verify_access(&tokens.access.token) {
            AccessVerdict::Valid(claims) => {
                assert_eq!(claims.user_id(), Some(user.id));
                assert_eq!(claims.email, "a@x.com");
            }
            other => panic!("expected valid token, got {other:?}"),
        }
        assert_eq!(
            service.session_owner(&tokens.refresh.token).await.unwrap(),
            user.id
        );
    }

    #[tokio::test]
    async fn test_refresh_spends_the_old_token() {
        let (service, _clock) = test_service();
        service.register("a@x.com", "Alice", "secret1").await.unwrap();
        let (_, tokens) = service.login("a@x.com", "secret1").await.unwrap();

        let refreshed = service.refresh(&tokens.refresh.token).await.unwrap();
        assert_ne!(refreshed.refresh.token, tokens.refresh.token);

        let again = service.refresh(&tokens.refresh.token).await;
        assert!(matches!(again, Err(AuthError::Revoked)));
        assert!(service.refresh(&refreshed.refresh.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_after_expiry_is_revoked() {
        let (service, clock) = test_service();
        service.register("a@x.com", "Alice", "secret1").await.unwrap();
        let (_, tokens) = service.login("a@x.com", "secret1").await.unwrap();

        clock.advance(Duration::seconds(
            test_auth_config().refresh_ttl_secs as i64,
        ));

        let result = service.refresh(&tokens.refresh.token).await;
        assert!(matches!(result, Err(AuthError::Revoked)));
        assert_eq!(service.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_logout_then_session_owner_is_revoked() {
        let (service, _clock) = test_service();
        service.register("a@x.com", "Alice", "secret1").await.unwrap();
        let (_, tokens) = service.login("a@x.com", "secret1").await.unwrap();

        service
            .logout(Some(&tokens.refresh.token), false)
            .await
            .unwrap();

        let owner = service.session_owner(&tokens.refresh.token).await;
        assert!(matches!(owner, Err(AuthError::Revoked)));
        // Access tokens outlive logout until their own expiry
        assert!(matches!(
            service.verify_access(&tokens.access.token),
            AccessVerdict::Valid(_)
        ));
    }

    #[tokio::test]
    async fn test_renewal_with_expired_access() {
        let (service, clock) = test_service();
        service.register("a@x.com", "Alice", "secret1").await.unwrap();
        let (user, tokens) = service.login("a@x.com", "secret1").await.unwrap();

        clock.advance(Duration::seconds(service.access_ttl_secs() as i64));

        let presented = PresentedCredentials {
            access: Some(tokens.access.token.clone()),
            refresh: Some(tokens.refresh.token.clone()),
        };
        match service.resolve_session(&presented).await.unwrap() {
            RenewalOutcome::Renewed {
                user: identity,
                access,
                refresh,
            } => {
                assert_eq!(identity.user_id, user.id);
                assert_ne!(access.token, tokens.access.token);
                assert!(refresh.is_none());
            }
            other => panic!("expected renewal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_renewal_rejects_dead_refresh_and_clears() {
        let (service, clock) = test_service();
        service.register("a@x.com", "Alice", "secret1").await.unwrap();
        let (_, tokens) = service.login("a@x.com", "secret1").await.unwrap();
        service
            .logout(Some(&tokens.refresh.token), false)
            .await
            .unwrap();
        clock.advance(Duration::seconds(service.access_ttl_secs() as i64));

        let presented = PresentedCredentials {
            access: Some(tokens.access.token),
            refresh: Some(tokens.refresh.token),
        };
        match service.resolve_session(&presented).await.unwrap() {
            RenewalOutcome::Rejected {
                reason,
                clear_credentials,
            } => {
                assert!(matches!(reason, AuthError::Revoked));
                assert!(clear_credentials);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_renewal_rotates_when_configured() {
        let mut config = test_auth_config();
        config.rotate_on_renewal = true;
        let clock = Arc::new(ManualClock::starting_now());
        let service = AuthService::new(&config, &Storage::in_memory(), clock.clone()).unwrap();
        service.register("a@x.com", "Alice", "secret1").await.unwrap();
        let (_, tokens) = service.login("a@x.com", "secret1").await.unwrap();

        let presented = PresentedCredentials {
            access: None,
            refresh: Some(tokens.refresh.token.clone()),
        };
        let RenewalOutcome::Renewed { refresh, .. } =
            service.resolve_session(&presented).await.unwrap()
        else {
            panic!("expected renewal");
        };

        let rotated = refresh.expect("refresh token should rotate");
        assert!(service.session_owner(&rotated.token).await.is_ok());
        assert!(service.session_owner(&tokens.refresh.token).await.is_err());
    }

    #[tokio::test]
    async fn test_renewal_fails_when_new_token_does_not_verify() {
        let config = test_auth_config();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let storage = Storage::in_memory();
        let service = AuthService::new(&config, &storage, clock.clone()).unwrap();
        service.register("a@x.com", "Alice", "secret1").await.unwrap();
        let (_, tokens) = service.login("a@x.com", "secret1").await.unwrap();

        // Verifier keyed with a different secret than the issuer
        let mut other = JwtConfig::from(&config);
        other.secret = "a-different-signing-secret".to_string();
        let ledger = SessionLedger::new(
            storage.ledger(),
            clock.clone(),
            config.refresh_ttl_secs,
            RetryPolicy::none(),
        );
        let coordinator = SessionRenewalCoordinator::new(
            AccessVerifier::new(other, clock.clone()),
            TokenIssuer::new(JwtConfig::from(&config), clock.clone(), ledger.clone()),
            ledger,
            service.credentials.clone(),
            false,
        );

        let presented = PresentedCredentials {
            access: None,
            refresh: Some(tokens.refresh.token),
        };
        let result = coordinator.resolve(&presented).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
