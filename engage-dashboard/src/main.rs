//! engage-dashboard - read-only engagement dashboards
//!
//! Serves `/api/dashboard` on 127.0.0.1:5811 by default. The database is
//! created and written by engage-submission.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use engage_common::config::{CliOverrides, ServiceConfig};
use engage_dashboard::{build_router, db, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "engage-dashboard";
const DEFAULT_BIND: &str = "127.0.0.1:5811";

/// Command-line arguments for engage-dashboard
#[derive(Parser, Debug)]
#[command(name = "engage-dashboard")]
#[command(about = "Read-only engagement dashboards")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file (opened read-only)
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

    info!("Starting Engage Dashboard (engage-dashboard) v{}", env!("CARGO_PKG_VERSION"));
    info!("Database path: {}", config.database_path.display());

    let pool = match db::connect_readonly(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Connected to database (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e);
        }
    };

    let app = build_router(AppState::new(pool));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("engage-dashboard listening on http://{}", config.bind_address);
    info!("Health check: http://{}/api/dashboard/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
