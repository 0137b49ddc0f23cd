//! Refresh token ledger operations on plaintext tokens
//!
//! Refresh tokens are 32 random bytes, base64url encoded. The plaintext goes
//! to the client once; storage only sees its [`TokenHash`].

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use docent_core::{Clock, RefreshCredential, RefreshLedger, TokenHash};
use rand::RngCore;
use std::sync::Arc;
use uuid::Uuid;

use super::error::AuthError;
use super::retry::RetryPolicy;

// About a century; keeps expiry arithmetic in range
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Generate a new opaque refresh token
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A refresh token as handed to the client
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Ledger access with retry, expiry and hashing applied
#[derive(Clone)]
pub struct SessionLedger {
    store: Arc<dyn RefreshLedger>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    retry: RetryPolicy,
}

impl SessionLedger {
    pub fn new(
        store: Arc<dyn RefreshLedger>,
        clock: Arc<dyn Clock>,
        ttl_secs: u64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
            retry,
        }
    }

    fn mint(&self, user_id: Uuid) -> (IssuedRefreshToken, RefreshCredential) {
        let token = generate_refresh_token();
        let now = self.clock.now();
        let credential = RefreshCredential::new(TokenHash::of(&token), user_id, now, now + self.ttl);
        let issued = IssuedRefreshToken {
            token,
            user_id,
            expires_at: credential.expires_at,
        };
        (issued, credential)
    }

    /// Mint a refresh token for `user_id` and record it
    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedRefreshToken, AuthError> {
        let (issued, credential) = self.mint(user_id);
        self.retry
            .run("ledger.insert", || self.store.insert(&credential))
            .await?;
        Ok(issued)
    }

    /// The ledger entry for `token` if it is live now
    pub async fn find_live(&self, token: &str) -> Result<Option<RefreshCredential>, AuthError> {
        let hash = TokenHash::of(token);
        let now = self.clock.now();
        Ok(self
            .retry
            .run("ledger.find_live", || self.store.find_live(&hash, now))
            .await?)
    }

    /// Swap `token` for a fresh one. `None` if `token` was not live for
    /// `user_id`, including when a concurrent rotation got there first.
    pub async fn rotate(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<IssuedRefreshToken>, AuthError> {
        let old = TokenHash::of(token);
        let (issued, replacement) = self.mint(user_id);
        let now = self.clock.now();

        let store = &self.store;
        let (old, replacement) = (&old, &replacement);
        let mut attempts = 0u32;
        let rotated = self
            .retry
            .run("ledger.rotate", || {
                attempts += 1;
                let retrying = attempts > 1;
                async move {
                    // A failed attempt may still have committed; the old row
                    // is then gone and the successor is live.
                    if retrying
                        && store
                            .find_live(&replacement.token_hash, now)
                            .await?
                            .is_some()
                    {
                        return Ok(true);
                    }
                    store.rotate(old, replacement, now).await
                }
            })
            .await?;

        Ok(rotated.then_some(issued))
    }

    /// Delete `token`; `false` if it was already gone
    pub async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        let hash = TokenHash::of(token);
        Ok(self
            .retry
            .run("ledger.revoke", || self.store.revoke(&hash))
            .await?)
    }

    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        Ok(self
            .retry
            .run("ledger.revoke_all", || self.store.revoke_all_for_user(user_id))
            .await?)
    }

    /// Delete entries that expired before now
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let now = self.clock.now();
        Ok(self
            .retry
            .run("ledger.purge_expired", || self.store.purge_expired(now))
            .await?)
    }
}
