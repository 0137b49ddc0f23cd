//! Credential store: registration and secret verification
//!
//! Argon2 work runs on the blocking pool so it never stalls the runtime.

use docent_core::{Clock, NewUser, RepositoryError, User, UserRepository};
use std::sync::Arc;

use super::error::AuthError;
use super::password::{PasswordError, SecretHasher};
use super::retry::RetryPolicy;

pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
    hasher: SecretHasher,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl CredentialStore {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: SecretHasher,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            users,
            hasher,
            clock,
            retry,
        }
    }

    /// Create an account. `Conflict` if the email is taken in any letter case.
    pub async fn register(
        &self,
        email: &str,
        display_name: &str,
        secret: &str,
    ) -> Result<User, AuthError> {
        check_registration(email, display_name, secret)?;

        let hasher = self.hasher.clone();
        let secret_owned = secret.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&secret_owned))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let new_user = NewUser::new(email, display_name, password_hash);
        let now = self.clock.now();

        self.retry
            .run("users.create", || self.users.create_user(new_user.clone(), now))
            .await
            .map_err(|e| match e {
                RepositoryError::EmailAlreadyExists => AuthError::Conflict,
                other => AuthError::Storage(other),
            })
    }

    /// Check `secret` against the stored hash for `email`
    ///
    /// An unknown email still pays for one Argon2 verification, so both
    /// failure paths cost about the same and return the same error.
    pub async fn verify(&self, email: &str, secret: &str) -> Result<User, AuthError> {
        let user = self
            .retry
            .run("users.find_by_email", || self.users.find_by_email(email))
            .await?;

        let hasher = self.hasher.clone();
        let secret_owned = secret.to_string();
        let stored = user.as_ref().map(|u| u.password_hash.clone());

        let matched = tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hasher.verify(&secret_owned, &hash),
            None => {
                hasher.verify_dummy(&secret_owned);
                Ok(false)
            }
        })
        .await
        .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))?;

        match (user, matched) {
            (Some(user), Ok(true)) => Ok(user),
            (_, Ok(false)) => Err(AuthError::InvalidCredentials),
            (_, Err(PasswordError::InvalidHashFormat)) => {
                tracing::error!(email, "Stored password hash is unreadable");
                Err(AuthError::Internal("unreadable password hash".to_string()))
            }
            (_, Err(e)) => Err(AuthError::Internal(e.to_string())),
            (None, Ok(true)) => Err(AuthError::InvalidCredentials),
        }
    }

    /// Load an account by id
    pub async fn find(&self, id: uuid::Uuid) -> Result<Option<User>, AuthError> {
        Ok(self
            .retry
            .run("users.find_by_id", || self.users.find_by_id(id))
            .await?)
    }
}

/// Minimum shape of a registration, whatever transport it arrived on
fn check_registration(email: &str, display_name: &str, secret: &str) -> Result<(), AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(AuthError::InvalidInput("email address is malformed".to_string())),
    }
    if display_name.trim().is_empty() {
        return Err(AuthError::InvalidInput("display name is empty".to_string()));
    }
    if secret.is_empty() {
        return Err(AuthError::InvalidInput("secret is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordConfig;
    use docent_core::{ManualClock, MemoryStore};

    fn store() -> CredentialStore {
        let hasher = SecretHasher::new(PasswordConfig {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        })
        .unwrap();
        CredentialStore::new(
            Arc::new(MemoryStore::new()),
            hasher,
            Arc::new(ManualClock::starting_now()),
            RetryPolicy::none(),
        )
    }

    #[tokio::test]
    async fn test_register_then_verify() {
        let store = store();
        let user = store.register("a@x.com", "Alice", "secret1").await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert!(user.password_hash.starts_with("$argon2id$"));

        let verified = store.verify("A@x.com", "secret1").await.unwrap();
        assert_eq!(verified.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_in_any_case() {
        let store = store();
        store.register("a@x.com", "Alice", "secret1").await.unwrap();

        let result = store.register("A@X.COM", "Impostor", "secret2").await;
        assert!(matches!(result, Err(AuthError::Conflict)));
    }

    #[tokio::test]
    async fn test_wrong_secret_and_unknown_email_look_the_same() {
        let store = store();
        store.register("a@x.com", "Alice", "secret1").await.unwrap();

        let wrong = store.verify("a@x.com", "secret2").await.unwrap_err();
        let unknown = store.verify("b@x.com", "secret1").await.unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_register_rejects_blank_fields() {
        let store = store();

        for (email, name, secret) in [
            ("not-an-email", "Alice", "secret1"),
            ("@x.com", "Alice", "secret1"),
            ("a@x.com", "   ", "secret1"),
            ("a@x.com", "Alice", ""),
        ] {
            let result = store.register(email, name, secret).await;
            assert!(
                matches!(result, Err(AuthError::InvalidInput(_))),
                "{email:?} {name:?} {secret:?}"
            );
        }
        assert!(store.verify("a@x.com", "secret1").await.is_err());
    }
}
