//! In-process credential store
//!
//! Backs local development and the test suites. Each table sits behind its
//! own `RwLock`; no lock is held across an await point other than the lock
//! acquisition itself, and `rotate` does its check-and-swap under a single
//! write guard.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RefreshLedger, RepositoryError, UserRepository};
use crate::models::{normalize_email, NewUser, RefreshCredential, TokenHash, User};

#[derive(Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    id_by_email: HashMap<String, Uuid>,
}

/// Memory-backed users and refresh ledger
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<UserTable>,
    tokens: RwLock<HashMap<TokenHash, RefreshCredential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored refresh credentials, live or not
    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, RepositoryError> {
        let key = normalize_email(&user.email);
        let mut table = self.users.write().await;
        if table.id_by_email.contains_key(&key) {
            return Err(RepositoryError::EmailAlreadyExists);
        }

        let user = user.into_user(now);
        table.id_by_email.insert(key, user.id);
        table.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let table = self.users.read().await;
        Ok(table
            .id_by_email
            .get(&normalize_email(email))
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.by_id.get(&id).cloned())
    }
}

#[async_trait]
impl RefreshLedger for MemoryStore {
    async fn insert(&self, credential: &RefreshCredential) -> Result<(), RepositoryError> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&credential.token_hash) {
            return Err(RepositoryError::Database(
                "duplicate refresh token digest".to_string(),
            ));
        }
        tokens.insert(credential.token_hash.clone(), credential.clone());
        Ok(())
    }

    async fn find_live(
        &self,
        hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshCredential>, RepositoryError> {
        Ok(self
            .tokens
            .read()
            .await
            .get(hash)
            .filter(|c| c.is_live(now))
            .cloned())
    }

    async fn revoke(&self, hash: &TokenHash) -> Result<bool, RepositoryError> {
        Ok(self.tokens.write().await.remove(hash).is_some())
    }

    async fn rotate(
        &self,
        old: &TokenHash,
        replacement: &RefreshCredential,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tokens = self.tokens.write().await;

        let live = tokens
            .get(old)
            .is_some_and(|c| c.user_id == replacement.user_id && c.is_live(now));
        if !live {
            return Ok(false);
        }
        if tokens.contains_key(&replacement.token_hash) {
            return Err(RepositoryError::Database(
                "duplicate refresh token digest".to_string(),
            ));
        }

        tokens.remove(old);
        tokens.insert(replacement.token_hash.clone(), replacement.clone());
        Ok(true)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, c| c.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, c| c.is_live(now));
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn credential(user_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> RefreshCredential {
        RefreshCredential::new(
            TokenHash::of(&Uuid::new_v4().to_string()),
            user_id,
            now,
            now + ttl,
        )
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store
            .create_user(NewUser::new("a@x.com", "A", "hash".into()), now)
            .await
            .unwrap();

        let by_email = store.find_by_email("A@X.COM").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");
        assert!(store.find_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .create_user(NewUser::new("a@x.com", "A", "hash".into()), now)
            .await
            .unwrap();

        let result = store
            .create_user(NewUser::new("A@X.com", "Other", "hash".into()), now)
            .await;
        assert!(matches!(result, Err(RepositoryError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn test_find_live_respects_expiry() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let cred = credential(Uuid::new_v4(), now, Duration::seconds(60));
        store.insert(&cred).await.unwrap();

        assert!(store.find_live(&cred.token_hash, now).await.unwrap().is_some());
        let later = now + Duration::seconds(60);
        assert!(store.find_live(&cred.token_hash, later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let cred = credential(Uuid::new_v4(), now, Duration::days(1));
        store.insert(&cred).await.unwrap();

        assert!(store.revoke(&cred.token_hash).await.unwrap());
        assert!(!store.revoke(&cred.token_hash).await.unwrap());
        assert!(store.find_live(&cred.token_hash, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_replaces_atomically() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let old = credential(user_id, now, Duration::days(1));
        let new = credential(user_id, now, Duration::days(1));
        store.insert(&old).await.unwrap();

        assert!(store.rotate(&old.token_hash, &new, now).await.unwrap());
        assert!(store.find_live(&old.token_hash, now).await.unwrap().is_none());
        assert!(store.find_live(&new.token_hash, now).await.unwrap().is_some());

        // Second rotation of the spent token changes nothing
        let other = credential(user_id, now, Duration::days(1));
        assert!(!store.rotate(&old.token_hash, &other, now).await.unwrap());
        assert!(store.find_live(&other.token_hash, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_rejects_foreign_or_expired_token() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let old = credential(Uuid::new_v4(), now, Duration::seconds(10));
        store.insert(&old).await.unwrap();

        let foreign = credential(Uuid::new_v4(), now, Duration::days(1));
        assert!(!store.rotate(&old.token_hash, &foreign, now).await.unwrap());

        let own = credential(old.user_id, now, Duration::days(1));
        let later = now + Duration::seconds(10);
        assert!(!store.rotate(&old.token_hash, &own, later).await.unwrap());
        assert_eq!(store.token_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_rotation_has_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let old = credential(user_id, now, Duration::days(1));
        store.insert(&old).await.unwrap();

        let attempts = (0..16).map(|_| {
            let store = store.clone();
            let old_hash = old.token_hash.clone();
            tokio::spawn(async move {
                let replacement = credential(user_id, now, Duration::days(1));
                store.rotate(&old_hash, &replacement, now).await.unwrap()
            })
        });

        let results = futures::future::join_all(attempts).await;
        let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(winners, 1);
        assert_eq!(store.token_count().await, 1);
    }

    #[tokio::test]
    async fn test_revoke_all_and_purge() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.insert(&credential(alice, now, Duration::days(1))).await.unwrap();
        store.insert(&credential(alice, now, Duration::days(1))).await.unwrap();
        store.insert(&credential(bob, now, Duration::seconds(5))).await.unwrap();
        store.insert(&credential(bob, now, Duration::days(1))).await.unwrap();

        assert_eq!(store.revoke_all_for_user(alice).await.unwrap(), 2);
        assert_eq!(
            store.purge_expired(now + Duration::seconds(5)).await.unwrap(),
            1
        );
        assert_eq!(store.token_count().await, 1);
    }
}
