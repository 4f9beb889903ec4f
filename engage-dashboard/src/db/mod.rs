//! Database access layer for engage-dashboard
//!
//! All connections are read-only. Only the projection tables are queried.

use anyhow::{Context, Result};
use engage_common::db::BUSY_TIMEOUT;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

pub mod queries;

/// Connect to the shared database in read-only mode
///
/// The submission service owns the schema; a missing file is an error.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found: {}\nStart engage-submission first to initialize the database.",
            db_path.display()
        );
    }

    // mode=ro without immutable=1: the submission service keeps writing
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=ro", db_path.display()))
        .context("Invalid database path")?
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to connect to database in read-only mode")?;

    // Verify read-only by attempting a write (should fail)
    #[cfg(debug_assertions)]
    {
        let write_test = sqlx::query("CREATE TABLE _test_write (id INTEGER)")
            .execute(&pool)
            .await;
        if write_test.is_ok() {
            anyhow::bail!("Database connection is not read-only: {}", db_path.display());
        }
    }

    Ok(pool)
}
