//! Domain models for users and refresh credentials
//!
//! - User: account identity and the Argon2id hash of its secret
//! - RefreshCredential: one live session, keyed by the digest of its token
//!
//! Both map to tables in `migrations/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Canonical form of an email address used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User account model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,

    /// Normalized email address (unique, used for login)
    pub email: String,

    /// Display name
    pub display_name: String,

    /// Hashed secret (Argon2id PHC string)
    /// This field is never serialized in API responses
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
///
/// The email is normalized by [`NewUser::new`]; storage backends rely on that.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(email: &str, display_name: &str, password_hash: String) -> Self {
        Self {
            email: normalize_email(email),
            display_name: display_name.trim().to_string(),
            password_hash,
        }
    }

    /// Materialize the row a backend stores
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            display_name: self.display_name,
            password_hash: self.password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

/// SHA-256 digest of a refresh token, hex encoded
///
/// Storage only ever sees this digest. Lookups are exact matches on it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);

impl TokenHash {
    /// Digest a plaintext token
    pub fn of(token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap a digest read back from storage
    pub fn from_stored(digest: String) -> Self {
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Enough to correlate log lines, not enough to look anything up
        write!(f, "TokenHash({}..)", &self.0[..self.0.len().min(8)])
    }
}

/// Refresh credential as persisted in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCredential {
    pub id: Uuid,
    pub token_hash: TokenHash,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshCredential {
    pub fn new(
        token_hash: TokenHash,
        user_id: Uuid,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_hash,
            user_id,
            expires_at,
            created_at,
        }
    }

    /// Expired once `now` reaches `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@X.com "), "a@x.com");
        assert_eq!(normalize_email("a@x.com"), "a@x.com");
    }

    #[test]
    fn test_new_user_normalizes() {
        let user = NewUser::new("Alice@Example.COM", " Alice ", "hash".to_string());
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.display_name, "Alice");
    }

    #[test]
    fn test_user_serialization_skips_hash() {
        let user = NewUser::new("a@x.com", "A", "secret-hash".to_string()).into_user(Utc::now());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("a@x.com"));
    }

    #[test]
    fn test_token_hash_is_stable_and_hex() {
        let a = TokenHash::of("token-value");
        let b = TokenHash::of("token-value");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, TokenHash::of("token-valuf"));
    }

    #[test]
    fn test_token_hash_debug_is_truncated() {
        let hash = TokenHash::of("abc");
        let debug = format!("{hash:?}");
        assert!(debug.len() < 20);
    }

    #[test]
    fn test_refresh_credential_expiry_boundary() {
        let now = Utc::now();
        let cred = RefreshCredential::new(
            TokenHash::of("t"),
            Uuid::new_v4(),
            now,
            now + Duration::seconds(10),
        );

        assert!(cred.is_live(now));
        assert!(cred.is_live(now + Duration::seconds(9)));
        assert!(cred.is_expired(now + Duration::seconds(10)));
        assert!(cred.is_expired(now + Duration::days(1)));
    }
}
