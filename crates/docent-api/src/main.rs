//! Docent API Server
//!
//! Session and authentication service.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use docent_api::{create_router, state::AppState, sweeper, telemetry};
use docent_core::{AppConfig, Storage, SystemClock};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(None).context("Failed to load configuration")?;
    telemetry::init_tracing(&config.logging);
    config.validate().context("Invalid configuration")?;

    let storage = Storage::connect(&config.database)
        .await
        .context("Failed to open storage")?;
    if config.database.run_migrations {
        storage.migrate().await.context("Failed to run migrations")?;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let sweep_interval_secs = config.auth.sweep_interval_secs;

    let state = Arc::new(
        AppState::new(config, storage.clone(), Arc::new(SystemClock))
            .context("Failed to initialise auth service")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task =
        sweeper::spawn_if_enabled(state.auth.clone(), sweep_interval_secs, shutdown_rx);

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(
        backend = storage.backend_name(),
        "Docent API Server starting on http://{}",
        addr
    );
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    let draining = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            draining.set_ready(false);
            tracing::info!("Gracefully shutting down");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = sweeper_task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Sweeper task ended abnormally");
        }
    }
    storage.close().await;
    tracing::info!("Storage closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
