//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::cookies::CookieSettings;
use crate::auth::error::AuthError;
use crate::auth::policy::RoutePolicy;
use crate::auth::service::AuthService;
use docent_core::{AppConfig, Clock, Storage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Storage handle opened at startup
    pub storage: Storage,
    pub auth: Arc<AuthService>,
    /// Public/protected partition used by the session guard
    pub route_policy: RoutePolicy,
    pub cookies: CookieSettings,
    /// Server start time
    pub start_time: Instant,
    /// Cleared while the server drains at shutdown
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Build the state and the auth service on top of `storage`
    pub fn new(
        config: AppConfig,
        storage: Storage,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let auth = Arc::new(AuthService::new(&config.auth, &storage, clock)?);
        Ok(Self {
            route_policy: RoutePolicy::from_config(&config.auth),
            cookies: CookieSettings::from(&config.auth),
            config,
            storage,
            auth,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
