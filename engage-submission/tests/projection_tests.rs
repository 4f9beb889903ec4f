//! Projection refresh tests

mod helpers;

use engage_common::config::IngestConfig;
use engage_common::models::{ColumnSpec, ColumnType, Template, UploadStatus};
use engage_submission::ingest::ProjectionRefresher;
use engage_submission::store::{SqliteStore, UploadQueries};
use helpers::*;
use std::sync::Arc;

const HEADER: &str = "submission_date,department,category";

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let state = create_test_state(pool.clone(), ingest_config());

    let file = csv_file(
        "a.csv",
        &[
            "submission_date,department,category,hours",
            "2024-01-15,Sales,Survey,2",
            "2024-01-20,Sales,Survey,3",
            "2024-02-01,Outreach,Event,1",
        ],
    );
    state.coordinator.submit(file, None, &staff()).await.unwrap();
    let file = csv_file("b.csv", &[HEADER, "2024-02-03,Outreach,Event", ",Ops,Event"]);
    state.coordinator.submit(file, None, &staff()).await.unwrap();

    state.refresher.refresh().await.unwrap();
    let first = projection_snapshot(&pool).await;
    let report = state.refresher.refresh().await.unwrap();
    let second = projection_snapshot(&pool).await;

    assert_eq!(first, second);
    assert_eq!(report.detailed_rows, 4);
    assert_eq!(report.medium_rows, 4);
    assert_eq!(report.summary_rows, 2);
}

#[tokio::test]
async fn test_summary_counts_by_month() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let state = create_test_state(pool.clone(), ingest_config());

    let file = csv_file(
        "a.csv",
        &[
            HEADER,
            "2024-01-15,Sales,Survey",
            "2024-01-20,Sales,Survey",
            "2024-02-01,Sales,Survey",
            "2024-02-09,Outreach,Event",
        ],
    );
    state.coordinator.submit(file, None, &staff()).await.unwrap();

    let rows = sqlx::query_scalar::<_, String>(
        "SELECT month || '|' || department || '|' || category || '|' || record_count \
         FROM projection_summary ORDER BY rowid",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(
        rows,
        vec![
            "2024-01|Sales|Survey|2".to_string(),
            "2024-02|Outreach|Event|1".to_string(),
            "2024-02|Sales|Survey|1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_medium_projection_drops_sensitive_fields() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let state = create_test_state(pool.clone(), ingest_config());

    let template = Template::new(
        "contacts",
        "1.0",
        vec![
            ColumnSpec::new("submission_date", ColumnType::Date).required(),
            ColumnSpec::new("department", ColumnType::Text).required(),
            ColumnSpec::new("category", ColumnType::Text),
            ColumnSpec::new("participant_email", ColumnType::Text).sensitive(),
        ],
    );
    state.store.create_template(&template).await.unwrap();

    let file = csv_file(
        "contacts.csv",
        &[
            "submission_date,department,category,participant_email,hours",
            "2024-03-01,Sales,Survey,pat@example.org,2",
        ],
    );
    let summary = state
        .coordinator
        .submit(file, Some(template.template_id), &staff())
        .await
        .unwrap();
    assert_eq!(summary.status, UploadStatus::Completed);

    let detailed = scalar_text(&pool, "SELECT data_fields FROM projection_detailed").await.unwrap();
    let medium = scalar_text(&pool, "SELECT data_fields FROM projection_medium").await.unwrap();

    assert!(detailed.contains("participant_email"));
    assert!(!medium.contains("participant_email"));
    assert!(!medium.contains("pat@example.org"));
    assert!(medium.contains("hours"));

    // Uploader identity stays out of the medium projection
    let uploader_columns: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('projection_medium') WHERE name = 'uploaded_by'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(uploader_columns, 0);
}

#[tokio::test]
async fn test_soft_deleted_rows_leave_projections() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let state = create_test_state(pool.clone(), ingest_config());

    let file = csv_file(
        "a.csv",
        &[
            HEADER,
            "2024-01-15,Sales,Survey",
            "2024-01-16,Sales,Survey",
            "2024-01-17,Sales,Survey",
        ],
    );
    let summary = state.coordinator.submit(file, None, &staff()).await.unwrap();
    assert_eq!(count_rows(&pool, "projection_detailed").await, 3);

    let changed = state
        .store
        .deactivate_rows(summary.upload_id, Some(&[3]))
        .await
        .unwrap();
    assert_eq!(changed, 1);
    // Already inactive rows are not counted again
    let changed = state
        .store
        .deactivate_rows(summary.upload_id, Some(&[3]))
        .await
        .unwrap();
    assert_eq!(changed, 0);

    state.refresher.refresh().await.unwrap();

    let numbers: Vec<i64> = state
        .store
        .list_active_rows(summary.upload_id)
        .await
        .unwrap()
        .iter()
        .map(|r| r.row_number)
        .collect();
    assert_eq!(numbers, vec![2, 4]);
    assert_eq!(count_rows(&pool, "projection_detailed").await, 2);
    assert_eq!(count_rows(&pool, "engagement_data").await, 3);

    let detail = state.store.get_upload(summary.upload_id).await.unwrap().unwrap();
    assert_eq!(detail.active_records, 2);
    assert_eq!(detail.rows_processed, 3);
}

#[tokio::test]
async fn test_failed_uploads_are_not_projected() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let config = IngestConfig {
        max_rows_per_file: 1,
        ..ingest_config()
    };
    let state = create_test_state(pool.clone(), config);

    let file = csv_file("a.csv", &[HEADER, "2024-01-15,Sales,Survey", "2024-01-16,Sales,Survey"]);
    let summary = state.coordinator.submit(file, None, &staff()).await.unwrap();
    assert_eq!(summary.status, UploadStatus::Failed);
    assert_eq!(count_rows(&pool, "engagement_data").await, 1);

    state.refresher.refresh().await.unwrap();
    assert_eq!(count_rows(&pool, "projection_detailed").await, 0);
    assert_eq!(count_rows(&pool, "projection_summary").await, 0);
}

#[tokio::test]
async fn test_deleted_upload_leaves_projections() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let state = create_test_state(pool.clone(), ingest_config());

    let file = csv_file("a.csv", &[HEADER, "2024-01-15,Sales,Survey"]);
    let summary = state.coordinator.submit(file, None, &staff()).await.unwrap();
    assert_eq!(count_rows(&pool, "projection_detailed").await, 1);

    assert!(state.store.delete_upload(summary.upload_id).await.unwrap());
    assert!(!state.store.delete_upload(summary.upload_id).await.unwrap());
    state.refresher.refresh().await.unwrap();

    assert_eq!(count_rows(&pool, "engagement_data").await, 0);
    assert_eq!(count_rows(&pool, "projection_detailed").await, 0);
}

#[tokio::test]
async fn test_each_refresh_is_logged() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let state = create_test_state(pool.clone(), ingest_config());

    state.refresher.refresh().await.unwrap();
    state.refresher.refresh().await.unwrap();

    assert_eq!(count_rows(&pool, "projection_refreshes").await, 2);
}

#[tokio::test]
async fn test_refresh_log_keeps_newest_entries() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let store = SqliteStore::new(pool.clone()).with_refresh_log_retention(3);
    let refresher = ProjectionRefresher::new(Arc::new(store));

    for _ in 0..5 {
        refresher.refresh().await.unwrap();
    }

    assert_eq!(count_rows(&pool, "projection_refreshes").await, 3);
    let oldest: i64 = sqlx::query_scalar("SELECT MIN(refresh_id) FROM projection_refreshes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(oldest, 3);
}
