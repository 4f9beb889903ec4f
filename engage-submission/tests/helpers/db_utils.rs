//! Database Test Utilities

use anyhow::Result;
use engage_common::config::IngestConfig;
use engage_common::db::init_database;
use engage_submission::AppState;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create temporary test database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_engage.db");
    let pool = init_database(&db_path).await?;
    Ok((temp_dir, pool))
}

/// Ingest settings with small limits for tests
pub fn ingest_config() -> IngestConfig {
    IngestConfig {
        max_file_size: 1024 * 1024,
        max_rows_per_file: 50,
        batch_size: 4,
        ..IngestConfig::default()
    }
}

pub fn create_test_state(pool: SqlitePool, config: IngestConfig) -> AppState {
    AppState::new(pool, config)
}

/// Row count of a table
pub async fn count_rows(pool: &SqlitePool, table_name: &str) -> i64 {
    let query = format!("SELECT COUNT(*) FROM {}", table_name);
    sqlx::query_scalar::<_, i64>(&query)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Single text value from a query
pub async fn scalar_text(pool: &SqlitePool, sql: &str) -> Option<String> {
    sqlx::query_scalar::<_, Option<String>>(sql)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Every projection row rendered as text, in a fixed order
pub async fn projection_snapshot(pool: &SqlitePool) -> Vec<String> {
    let queries = [
        "SELECT 'D|' || data_id || '|' || file_id || '|' || row_number || '|' || \
                IFNULL(submission_date, '~') || '|' || IFNULL(department, '~') || '|' || \
                IFNULL(category, '~') || '|' || data_fields || '|' || filename || '|' || \
                template_id || '|' || uploaded_by || '|' || uploader_role || '|' || uploaded_at \
         FROM projection_detailed ORDER BY rowid",
        "SELECT 'M|' || data_id || '|' || file_id || '|' || row_number || '|' || \
                IFNULL(submission_date, '~') || '|' || IFNULL(department, '~') || '|' || \
                IFNULL(category, '~') || '|' || data_fields || '|' || template_id \
         FROM projection_medium ORDER BY rowid",
        "SELECT 'S|' || IFNULL(month, '~') || '|' || IFNULL(department, '~') || '|' || \
                IFNULL(category, '~') || '|' || record_count \
         FROM projection_summary ORDER BY rowid",
    ];

    let mut lines = Vec::new();
    for query in queries {
        let rows = sqlx::query_scalar::<_, String>(query)
            .fetch_all(pool)
            .await
            .unwrap();
        lines.extend(rows);
    }
    lines
}
