//! Fixtures for unit tests

use docent_core::{AuthConfig, ManualClock, Storage};
use std::sync::Arc;

use super::service::AuthService;

/// Default auth settings with a cheap Argon2 cost and no retry delay
pub(crate) fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-signing-secret".to_string(),
        argon2_memory_kib: 8192,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        storage_retry_attempts: 1,
        ..AuthConfig::default()
    }
}

/// Auth service over in-memory storage with a clock the test controls
pub(crate) fn test_service() -> (AuthService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let service = AuthService::new(&test_auth_config(), &Storage::in_memory(), clock.clone())
        .expect("test auth service");
    (service, clock)
}
