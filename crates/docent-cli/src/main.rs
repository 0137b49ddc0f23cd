//! Docent CLI - Operator commands
//!
//! Usage:
//!   docent migrate
//!   docent sweep
//!   docent verify-token <token>
//!   docent config [--json]

use anyhow::Context;
use clap::{Parser, Subcommand};
use docent_api::auth::models::ClaimsView;
use docent_api::auth::{AccessVerdict, AuthService};
use docent_api::telemetry;
use docent_core::{AppConfig, Storage, SystemClock};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "docent")]
#[command(about = "Docent session service operator CLI")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (falls back to DOCENT_CONFIG, then the environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Delete expired refresh tokens once
    Sweep,
    /// Check an access token against the configured signing secret
    VerifyToken {
        /// Access token to check
        token: String,
    },
    /// Print the effective configuration with secrets redacted
    Config {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config).context("Failed to load configuration")?;
    telemetry::init_tracing(&config.logging);

    match cli.command {
        Commands::Migrate => {
            let storage = open_storage(&config).await?;
            storage.migrate().await.context("Failed to run migrations")?;
            storage.close().await;
            println!("Migrations applied ({})", storage.backend_name());
        }
        Commands::Sweep => {
            let storage = open_storage(&config).await?;
            let auth = auth_service(&config, &storage)?;
            let purged = auth
                .purge_expired()
                .await
                .context("Failed to purge expired refresh tokens")?;
            storage.close().await;
            println!("Purged {purged} expired refresh token(s)");
        }
        Commands::VerifyToken { token } => {
            // Verification needs no storage; the in-memory handle never connects anywhere
            let auth = auth_service(&config, &Storage::in_memory())?;
            match auth.verify_access(token.trim()) {
                AccessVerdict::Valid(claims) => {
                    let view = ClaimsView::from(claims);
                    println!("valid");
                    println!("{}", serde_json::to_string_pretty(&view)?);
                }
                AccessVerdict::Expired => {
                    println!("expired");
                    return Ok(ExitCode::FAILURE);
                }
                AccessVerdict::Malformed => {
                    println!("invalid");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Config { json } => {
            let redacted = config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&redacted)?);
            } else {
                println!("{}", toml::to_string_pretty(&redacted)?);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn open_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    config.validate().context("Invalid configuration")?;
    Storage::connect(&config.database)
        .await
        .context("Failed to open storage")
}

fn auth_service(config: &AppConfig, storage: &Storage) -> anyhow::Result<AuthService> {
    AuthService::new(&config.auth, storage, Arc::new(SystemClock))
        .context("Failed to initialise auth service")
}
