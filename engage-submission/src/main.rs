//! engage-submission - file submission and ingestion service
//!
//! Serves `/api/submission` on 127.0.0.1:5810 by default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use engage_common::config::{CliOverrides, ServiceConfig};
use engage_common::db::init_database;
use engage_submission::{build_router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "engage-submission";
const DEFAULT_BIND: &str = "127.0.0.1:5810";

/// Command-line arguments for engage-submission
#[derive(Parser, Debug)]
#[command(name = "engage-submission")]
#[command(about = "Engagement data submission service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Address to listen on (host:port)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::resolve(
        SERVICE_NAME,
        DEFAULT_BIND,
        &CliOverrides {
            config: args.config,
            database: args.database,
            bind: args.bind,
        },
    )
    .context("Failed to resolve configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting Engage Submission (engage-submission) v{}", env!("CARGO_PKG_VERSION"));
    match &config.config_file {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using defaults"),
    }
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let state = AppState::new(pool, config.ingest.clone());

    // Bring projections in line with whatever is already stored
    state
        .refresher
        .refresh()
        .await
        .context("Initial projection refresh failed")?;

    let _scheduled = config
        .projections
        .refresh_interval_secs
        .filter(|secs| *secs > 0)
        .map(|secs| state.refresher.clone().spawn_interval(Duration::from_secs(secs)));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("engage-submission listening on http://{}", config.bind_address);
    info!("Health check: http://{}/api/submission/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
