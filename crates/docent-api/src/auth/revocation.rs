//! Revocation handler
//!
//! Logout removes refresh tokens from the ledger. Access tokens already
//! handed out stay valid until their own expiry.

use uuid::Uuid;

use super::error::AuthError;
use super::ledger::SessionLedger;

/// What a logout actually removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutOutcome {
    /// Owner of the token, when it was still live
    pub user_id: Option<Uuid>,
    /// Ledger entries deleted
    pub revoked: u64,
}

pub struct RevocationHandler {
    ledger: SessionLedger,
}

impl RevocationHandler {
    pub fn new(ledger: SessionLedger) -> Self {
        Self { ledger }
    }

    /// Revoke `refresh_token`, or every session of its owner with `all_devices`
    ///
    /// Succeeds when there is nothing to revoke. Storage failures are still
    /// reported.
    pub async fn logout(
        &self,
        refresh_token: Option<&str>,
        all_devices: bool,
    ) -> Result<LogoutOutcome, AuthError> {
        let Some(token) = refresh_token else {
            return Ok(LogoutOutcome::default());
        };

        if all_devices {
            if let Some(credential) = self.ledger.find_live(token).await? {
                let revoked = self.ledger.revoke_all(credential.user_id).await?;
                return Ok(LogoutOutcome {
                    user_id: Some(credential.user_id),
                    revoked,
                });
            }
        }

        let removed = self.ledger.revoke(token).await?;
        Ok(LogoutOutcome {
            user_id: None,
            revoked: u64::from(removed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::retry::RetryPolicy;
    use docent_core::{ManualClock, MemoryStore};
    use std::sync::Arc;

    fn handler() -> (RevocationHandler, SessionLedger) {
        let ledger = SessionLedger::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::starting_now()),
            3600,
            RetryPolicy::none(),
        );
        (RevocationHandler::new(ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn test_logout_twice_is_ok() {
        let (handler, ledger) = handler();
        let issued = ledger.issue(Uuid::new_v4()).await.unwrap();

        let first = handler.logout(Some(&issued.token), false).await.unwrap();
        let second = handler.logout(Some(&issued.token), false).await.unwrap();

        assert_eq!(first.revoked, 1);
        assert_eq!(second, LogoutOutcome::default());
        assert!(ledger.find_live(&issued.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_without_token() {
        let (handler, _) = handler();
        assert_eq!(
            handler.logout(None, true).await.unwrap(),
            LogoutOutcome::default()
        );
    }

    #[tokio::test]
    async fn test_logout_all_devices() {
        let (handler, ledger) = handler();
        let user_id = Uuid::new_v4();
        let phone = ledger.issue(user_id).await.unwrap();
        let laptop = ledger.issue(user_id).await.unwrap();
        let someone_else = ledger.issue(Uuid::new_v4()).await.unwrap();

        let outcome = handler.logout(Some(&phone.token), true).await.unwrap();

        assert_eq!(outcome.user_id, Some(user_id));
        assert_eq!(outcome.revoked, 2);
        assert!(ledger.find_live(&laptop.token).await.unwrap().is_none());
        assert!(ledger.find_live(&someone_else.token).await.unwrap().is_some());
    }
}
