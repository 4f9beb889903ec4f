//! Database initialization
//!
//! Creates the database file on first run, then creates every table
//! idempotently and seeds the built-in template. Safe to call on every
//! service start.

use crate::models::default_template;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every connection
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open (creating if needed) the database and bring the schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Per-connection pragmas go on the connect options so every pooled
    // connection gets them, not just the first.
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and seed reference rows (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_upload_templates_table(pool).await?;
    create_uploaded_files_table(pool).await?;
    create_engagement_data_table(pool).await?;

    // Read projections (written only by the refresher)
    create_projection_detailed_table(pool).await?;
    create_projection_medium_table(pool).await?;
    create_projection_summary_table(pool).await?;
    create_projection_refreshes_table(pool).await?;

    create_audit_log_table(pool).await?;

    seed_default_template(pool).await?;

    Ok(())
}

async fn create_upload_templates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_templates (
            template_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            description TEXT,
            columns TEXT NOT NULL CHECK (json_type(columns) = 'array'),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            created_by TEXT,
            UNIQUE (name, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_uploaded_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS uploaded_files (
            file_id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            file_size INTEGER NOT NULL CHECK (file_size > 0),
            file_format TEXT NOT NULL,
            template_id TEXT NOT NULL REFERENCES upload_templates(template_id),
            uploaded_by TEXT NOT NULL,
            uploader_role TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'completed', 'failed', 'rejected')),
            rows_processed INTEGER NOT NULL DEFAULT 0,
            rows_failed INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            validation_notes TEXT,
            uploaded_at TEXT NOT NULL,
            processed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_uploaded_files_owner ON uploaded_files(uploaded_by, uploaded_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_uploaded_files_status ON uploaded_files(status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_engagement_data_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS engagement_data (
            data_id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL REFERENCES uploaded_files(file_id) ON DELETE CASCADE,
            row_number INTEGER NOT NULL CHECK (row_number >= 1),
            submission_date TEXT,
            department TEXT,
            category TEXT,
            data_fields TEXT NOT NULL CHECK (json_type(data_fields) = 'object'),
            created_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            UNIQUE (file_id, row_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_engagement_data_filters ON engagement_data(department, category, submission_date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_projection_detailed_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projection_detailed (
            data_id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL,
            row_number INTEGER NOT NULL,
            submission_date TEXT,
            department TEXT,
            category TEXT,
            data_fields TEXT NOT NULL,
            filename TEXT NOT NULL,
            template_id TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            uploader_role TEXT NOT NULL,
            uploaded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Same rows as detailed, minus sensitive fields and uploader identity
async fn create_projection_medium_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projection_medium (
            data_id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL,
            row_number INTEGER NOT NULL,
            submission_date TEXT,
            department TEXT,
            category TEXT,
            data_fields TEXT NOT NULL,
            template_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_projection_summary_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projection_summary (
            month TEXT,
            department TEXT,
            category TEXT,
            record_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_projection_refreshes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projection_refreshes (
            refresh_id INTEGER PRIMARY KEY AUTOINCREMENT,
            refreshed_at TEXT NOT NULL,
            detailed_rows INTEGER NOT NULL,
            medium_rows INTEGER NOT NULL,
            summary_rows INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_audit_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT,
            action TEXT NOT NULL,
            table_name TEXT NOT NULL,
            record_id TEXT,
            old_values TEXT,
            new_values TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert the built-in template unless it already exists
async fn seed_default_template(pool: &SqlitePool) -> Result<()> {
    let template = default_template();
    let columns = serde_json::to_string(&template.columns)?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO upload_templates
            (template_id, name, version, description, columns, is_active, created_at, created_by)
        VALUES (?, ?, ?, ?, ?, 1, ?, NULL)
        "#,
    )
    .bind(template.template_id.to_string())
    .bind(&template.name)
    .bind(&template.version)
    .bind(&template.description)
    .bind(columns)
    .bind(template.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
