//! Periodic purge of expired refresh tokens
//!
//! Expired tokens are already treated as absent by every lookup; the sweep
//! only keeps the table small.

use crate::auth::AuthService;
use crate::metrics::REFRESH_TOKENS_PURGED_TOTAL;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Run one sweep, logging the outcome. Returns rows deleted.
pub async fn sweep_once(auth: &AuthService) -> u64 {
    match auth.purge_expired().await {
        Ok(purged) => {
            REFRESH_TOKENS_PURGED_TOTAL.inc_by(purged);
            if purged > 0 {
                info!(purged, "Purged expired refresh tokens");
            } else {
                debug!("No expired refresh tokens to purge");
            }
            purged
        }
        Err(e) => {
            warn!(error = %e, "Refresh token sweep failed");
            0
        }
    }
}

/// Spawn the sweeper unless `interval_secs` is 0, which disables it
pub fn spawn_if_enabled(
    auth: Arc<AuthService>,
    interval_secs: u64,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!("Refresh token sweeper disabled");
        return None;
    }
    info!(interval_secs, "Refresh token sweeper enabled");
    Some(spawn(auth, Duration::from_secs(interval_secs), shutdown))
}

/// Spawn the sweeper; it stops when `shutdown` changes or its sender drops
pub fn spawn(
    auth: Arc<AuthService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so startup does not sweep
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_once(&auth).await;
                }
                _ = shutdown.changed() => {
                    debug!("Refresh token sweeper stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::test_service;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_sweep_once_counts_expired() {
        let (service, clock) = test_service();
        service.register("a@x.com", "Alice", "secret1").await.unwrap();
        service.login("a@x.com", "secret1").await.unwrap();
        service.login("a@x.com", "secret1").await.unwrap();

        assert_eq!(sweep_once(&service).await, 0);

        clock.advance(ChronoDuration::days(8));
        assert_eq!(sweep_once(&service).await, 2);
    }

    #[tokio::test]
    async fn test_zero_interval_starts_no_sweeper() {
        let (service, _clock) = test_service();
        let (_tx, rx) = watch::channel(false);

        assert!(spawn_if_enabled(Arc::new(service), 0, rx).is_none());
    }

    #[tokio::test]
    async fn test_nonzero_interval_starts_sweeper() {
        let (service, _clock) = test_service();
        let (tx, rx) = watch::channel(false);

        let handle = spawn_if_enabled(Arc::new(service), 3600, rx).unwrap();
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let (service, _clock) = test_service();
        let (tx, rx) = watch::channel(false);

        let handle = spawn(Arc::new(service), Duration::from_secs(3600), rx);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
