//! Docent Core - Domain models, configuration, and credential storage
//!
//! This crate defines the pieces the session service is built on:
//! - User and refresh credential models
//! - Storage traits with PostgreSQL and in-memory backends
//! - The explicit [`Storage`] handle opened at startup
//! - A [`Clock`] abstraction for expiry decisions
//! - Configuration management

pub mod clock;
pub mod config;
pub mod models;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig,
    StorageBackend,
};
pub use models::{normalize_email, NewUser, RefreshCredential, TokenHash, User};
pub use storage::{
    MemoryStore, PgStore, RefreshLedger, RepositoryError, Storage, UserRepository,
};
