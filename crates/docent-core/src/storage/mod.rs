//! Credential storage
//!
//! [`UserRepository`] holds accounts and [`RefreshLedger`] holds live refresh
//! credentials. [`Storage`] is the handle that owns a backend for the life of
//! the process: it is opened once at startup, cloned into the components that
//! need it and closed at shutdown.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{DatabaseConfig, StorageBackend};
use crate::models::{NewUser, RefreshCredential, TokenHash, User};

/// Storage errors
///
/// `Unavailable` is the only transient kind; callers may retry it. Everything
/// else is a definite answer from the backend.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl RepositoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => RepositoryError::Unavailable(err.to_string()),
            sqlx::Error::Database(ref db_err)
                if db_err
                    .code()
                    .is_some_and(|code| code.starts_with("08") || code == "40001") =>
            {
                // connection exceptions and serialization failures
                RepositoryError::Unavailable(err.to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for RepositoryError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        RepositoryError::Migration(err.to_string())
    }
}

/// User account storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; `EmailAlreadyExists` if the normalized email is taken
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, RepositoryError>;

    /// Look up by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
}

/// Refresh credential ledger
///
/// A credential is either live (present and `now < expires_at`) or absent.
/// Lookups are exact matches on the token digest.
#[async_trait]
pub trait RefreshLedger: Send + Sync {
    async fn insert(&self, credential: &RefreshCredential) -> Result<(), RepositoryError>;

    /// The credential for `hash` if it exists and has not expired at `now`
    async fn find_live(
        &self,
        hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshCredential>, RepositoryError>;

    /// Delete by digest. Returns whether a row was removed; deleting an
    /// absent credential is not an error.
    async fn revoke(&self, hash: &TokenHash) -> Result<bool, RepositoryError>;

    /// Atomically replace the live credential `old` (owned by
    /// `replacement.user_id`) with `replacement`.
    ///
    /// Returns `false` and changes nothing if `old` is not live for that user
    /// at `now`. Concurrent rotations of the same `old` have exactly one
    /// winner.
    async fn rotate(
        &self,
        old: &TokenHash,
        replacement: &RefreshCredential,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Delete every credential owned by `user_id`
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError>;

    /// Delete every credential expired at `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory,
}

/// Explicit storage handle
#[derive(Clone)]
pub struct Storage {
    backend: Backend,
    users: Arc<dyn UserRepository>,
    ledger: Arc<dyn RefreshLedger>,
}

impl Storage {
    /// Open the backend named in `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            StorageBackend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.postgres_pool_size)
                    .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
                    .connect(&config.postgres_url)
                    .await
                    .map_err(|e| {
                        RepositoryError::Unavailable(format!("PostgreSQL connection failed: {e}"))
                    })?;
                tracing::info!(
                    pool_size = config.postgres_pool_size,
                    "Connected to PostgreSQL"
                );
                Ok(Self::from_pool(pool))
            }
        }
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::from_pool(pool.clone()));
        Self {
            backend: Backend::Postgres(pool),
            users: store.clone(),
            ledger: store,
        }
    }

    /// Process-local backend for development and tests
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            backend: Backend::Memory,
            users: store.clone(),
            ledger: store,
        }
    }

    /// Replace the ledger, keeping the user repository
    pub fn with_ledger(mut self, ledger: Arc<dyn RefreshLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    pub fn ledger(&self) -> Arc<dyn RefreshLedger> {
        self.ledger.clone()
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Postgres(_) => "postgres",
            Backend::Memory => "memory",
        }
    }

    /// Apply embedded migrations (no-op for the memory backend)
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        if let Backend::Postgres(pool) = &self.backend {
            sqlx::migrate!("./migrations").run(pool).await?;
            tracing::info!("Database migrations applied");
        }
        Ok(())
    }

    /// Round-trip to the backend
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        if let Backend::Postgres(pool) = &self.backend {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }

    /// Drain pooled connections
    pub async fn close(&self) {
        if let Backend::Postgres(pool) = &self.backend {
            pool.close().await;
            tracing::info!("PostgreSQL pool closed");
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("backend", &self.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl sqlx::error::DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(RepositoryError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(RepositoryError::from(sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn test_connection_sqlstate_is_transient() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("08006"),
        }));
        assert!(RepositoryError::from(err).is_transient());
    }

    #[test]
    fn test_semantic_errors_are_not_transient() {
        assert!(!RepositoryError::from(sqlx::Error::RowNotFound).is_transient());
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(!RepositoryError::from(err).is_transient());
        assert!(!RepositoryError::EmailAlreadyExists.is_transient());
    }

    #[tokio::test]
    async fn test_in_memory_storage_lifecycle() {
        let storage = Storage::in_memory();
        assert_eq!(storage.backend_name(), "memory");
        storage.migrate().await.unwrap();
        storage.ping().await.unwrap();
        storage.close().await;
    }
}
