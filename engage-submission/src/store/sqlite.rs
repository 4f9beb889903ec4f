//! SQLite implementation of the storage traits
//!
//! Ids are stored as UUID text, timestamps as RFC 3339 text with fixed
//! microsecond precision (so they sort lexically), documents as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use engage_common::models::{Template, UploadStatus, UserRole};
use engage_common::{Error, Result};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{IngestStore, ProjectionStore, UploadQueries};
use crate::ingest::NormalizedRow;
use crate::models::{
    MediumRecord, NewUpload, ProjectionSet, ProjectionSourceRow, StoredRow, SummaryRecord,
    UploadCompletion, UploadDetail, UploadListQuery, UploadPage,
};

/// The soft-delete filter; every read of row-records goes through it
const ACTIVE_ROWS: &str = "engagement_data.is_active = 1";

/// Rows per multi-row INSERT statement
const INSERT_CHUNK: usize = 500;

const UPLOAD_COLUMNS: &str = "file_id, filename, file_size, file_format, template_id, uploaded_by, \
     uploader_role, status, rows_processed, rows_failed, error_message, validation_notes, \
     uploaded_at, processed_at";

const TEMPLATE_COLUMNS: &str =
    "template_id, name, version, description, columns, is_active, created_at, created_by";

/// Refresh log rows kept after each refresh
pub const REFRESH_LOG_RETENTION: i64 = 1000;

/// Storage over one SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    refresh_log_retention: i64,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            refresh_log_retention: REFRESH_LOG_RETENTION,
        }
    }

    /// Keep only the newest `rows` entries of `projection_refreshes`
    pub fn with_refresh_log_retention(mut self, rows: i64) -> Self {
        self.refresh_log_retention = rows.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

fn parse_fields(value: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Internal("data_fields is not a JSON object".to_string())),
    }
}

fn template_from_row(row: &SqliteRow) -> Result<Template> {
    let template_id: String = row.get("template_id");
    let columns: String = row.get("columns");
    let created_at: String = row.get("created_at");
    let created_by: Option<String> = row.get("created_by");

    Ok(Template {
        template_id: parse_uuid(&template_id, "template_id")?,
        name: row.get("name"),
        version: row.get("version"),
        description: row.get("description"),
        columns: serde_json::from_str(&columns)?,
        is_active: row.get::<i64, _>("is_active") != 0,
        created_at: parse_timestamp(&created_at, "created_at")?,
        created_by: created_by
            .map(|s| parse_uuid(&s, "created_by"))
            .transpose()?,
    })
}

fn upload_select() -> String {
    format!(
        "SELECT {}, (SELECT COUNT(*) FROM engagement_data \
             WHERE engagement_data.file_id = uploaded_files.file_id AND {}) AS active_records \
         FROM uploaded_files",
        UPLOAD_COLUMNS, ACTIVE_ROWS
    )
}

fn upload_from_row(row: &SqliteRow) -> Result<UploadDetail> {
    let file_id: String = row.get("file_id");
    let template_id: String = row.get("template_id");
    let uploaded_by: String = row.get("uploaded_by");
    let uploader_role: String = row.get("uploader_role");
    let status: String = row.get("status");
    let uploaded_at: String = row.get("uploaded_at");
    let processed_at: Option<String> = row.get("processed_at");

    Ok(UploadDetail {
        upload_id: parse_uuid(&file_id, "file_id")?,
        filename: row.get("filename"),
        file_size: row.get("file_size"),
        file_format: row.get("file_format"),
        template_id: parse_uuid(&template_id, "template_id")?,
        uploaded_by: parse_uuid(&uploaded_by, "uploaded_by")?,
        uploader_role: uploader_role.parse::<UserRole>()?,
        status: status.parse::<UploadStatus>()?,
        rows_processed: row.get("rows_processed"),
        rows_failed: row.get("rows_failed"),
        error_message: row.get("error_message"),
        validation_notes: row.get("validation_notes"),
        uploaded_at: parse_timestamp(&uploaded_at, "uploaded_at")?,
        processed_at: processed_at
            .map(|s| parse_timestamp(&s, "processed_at"))
            .transpose()?,
        active_records: row.get("active_records"),
    })
}

fn stored_row_from_row(row: &SqliteRow) -> Result<StoredRow> {
    let data_id: String = row.get("data_id");
    let file_id: String = row.get("file_id");
    let submission_date: Option<String> = row.get("submission_date");
    let data_fields: String = row.get("data_fields");
    let created_at: String = row.get("created_at");

    Ok(StoredRow {
        data_id: parse_uuid(&data_id, "data_id")?,
        file_id: parse_uuid(&file_id, "file_id")?,
        row_number: row.get("row_number"),
        submission_date: submission_date
            .map(|s| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|e| Error::Internal(format!("Failed to parse submission_date: {}", e)))
            })
            .transpose()?,
        department: row.get("department"),
        category: row.get("category"),
        data_fields: parse_fields(&data_fields)?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        is_active: row.get::<i64, _>("is_active") != 0,
    })
}

fn push_upload_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &UploadListQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(owner) = query.owner {
        builder.push(" AND uploaded_by = ").push_bind(owner.to_string());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

/// Accepted row with every column already encoded for binding
struct PreparedRow {
    data_id: String,
    row_number: i64,
    submission_date: Option<String>,
    department: Option<String>,
    category: Option<String>,
    data_fields: String,
}

#[async_trait]
impl IngestStore for SqliteStore {
    async fn get_active_template(&self, template_id: Uuid) -> Result<Option<Template>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM upload_templates WHERE template_id = ? AND is_active = 1",
            TEMPLATE_COLUMNS
        ))
        .bind(template_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(template_from_row).transpose()
    }

    async fn create_upload(&self, upload: &NewUpload) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO uploaded_files (
                file_id, filename, file_size, file_format, template_id,
                uploaded_by, uploader_role, status, uploaded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(upload.file_id.to_string())
        .bind(&upload.filename)
        .bind(upload.file_size)
        .bind(&upload.file_format)
        .bind(upload.template_id.to_string())
        .bind(upload.uploaded_by.to_string())
        .bind(upload.uploader_role.as_str())
        .bind(format_timestamp(upload.uploaded_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_upload_status(&self, file_id: Uuid, status: UploadStatus) -> Result<()> {
        let result = sqlx::query("UPDATE uploaded_files SET status = ? WHERE file_id = ?")
            .bind(status.as_str())
            .bind(file_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Upload {}", file_id)));
        }
        Ok(())
    }

    async fn insert_rows(&self, file_id: Uuid, rows: &[NormalizedRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        // Prepare all data BEFORE opening the transaction
        let file_id = file_id.to_string();
        let created_at = format_timestamp(Utc::now());
        let prepared = rows
            .iter()
            .map(|row| -> Result<PreparedRow> {
                Ok(PreparedRow {
                    data_id: Uuid::new_v4().to_string(),
                    row_number: i64::from(row.row_number),
                    submission_date: row.submission_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    department: row.department.clone(),
                    category: row.category.clone(),
                    data_fields: serde_json::to_string(&row.data_fields)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await?;
        for chunk in prepared.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO engagement_data (data_id, file_id, row_number, submission_date, \
                 department, category, data_fields, created_at, is_active) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.data_id.clone())
                    .push_bind(file_id.clone())
                    .push_bind(row.row_number)
                    .push_bind(row.submission_date.clone())
                    .push_bind(row.department.clone())
                    .push_bind(row.category.clone())
                    .push_bind(row.data_fields.clone())
                    .push_bind(created_at.clone())
                    .push_bind(1_i64);
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn finish_upload(&self, file_id: Uuid, completion: &UploadCompletion) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE uploaded_files SET
                status = ?,
                rows_processed = ?,
                rows_failed = ?,
                error_message = ?,
                validation_notes = ?,
                processed_at = ?
            WHERE file_id = ?
            "#,
        )
        .bind(completion.status.as_str())
        .bind(completion.rows_processed)
        .bind(completion.rows_failed)
        .bind(&completion.error_message)
        .bind(&completion.validation_notes)
        .bind(format_timestamp(completion.processed_at))
        .bind(file_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Upload {}", file_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl UploadQueries for SqliteStore {
    async fn get_upload(&self, file_id: Uuid) -> Result<Option<UploadDetail>> {
        let row = sqlx::query(&format!("{} WHERE file_id = ?", upload_select()))
            .bind(file_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(upload_from_row).transpose()
    }

    async fn list_uploads(&self, query: &UploadListQuery) -> Result<UploadPage> {
        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM uploaded_files");
        push_upload_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut page: QueryBuilder<Sqlite> = QueryBuilder::new(upload_select());
        push_upload_filters(&mut page, query);
        page.push(" ORDER BY uploaded_at DESC, file_id LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);
        let rows = page.build().fetch_all(&self.pool).await?;

        let uploads = rows.iter().map(upload_from_row).collect::<Result<Vec<_>>>()?;

        Ok(UploadPage {
            uploads,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    async fn list_active_rows(&self, file_id: Uuid) -> Result<Vec<StoredRow>> {
        let rows = sqlx::query(&format!(
            "SELECT data_id, file_id, row_number, submission_date, department, category, \
                    data_fields, created_at, is_active \
             FROM engagement_data WHERE file_id = ? AND {} ORDER BY row_number",
            ACTIVE_ROWS
        ))
        .bind(file_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(stored_row_from_row).collect()
    }

    async fn deactivate_rows(&self, file_id: Uuid, row_numbers: Option<&[i64]>) -> Result<u64> {
        if row_numbers.is_some_and(|numbers| numbers.is_empty()) {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "UPDATE engagement_data SET is_active = 0 WHERE {} AND file_id = ",
            ACTIVE_ROWS
        ));
        builder.push_bind(file_id.to_string());

        if let Some(numbers) = row_numbers {
            builder.push(" AND row_number IN (");
            let mut separated = builder.separated(", ");
            for number in numbers {
                separated.push_bind(*number);
            }
            separated.push_unseparated(")");
        }

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_upload(&self, file_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM uploaded_files WHERE file_id = ?")
            .bind(file_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_templates(&self, include_inactive: bool) -> Result<Vec<Template>> {
        let sql = if include_inactive {
            format!("SELECT {} FROM upload_templates ORDER BY name, version", TEMPLATE_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM upload_templates WHERE is_active = 1 ORDER BY name, version",
                TEMPLATE_COLUMNS
            )
        };

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(template_from_row).collect()
    }

    async fn get_template(&self, template_id: Uuid) -> Result<Option<Template>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM upload_templates WHERE template_id = ?",
            TEMPLATE_COLUMNS
        ))
        .bind(template_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(template_from_row).transpose()
    }

    async fn create_template(&self, template: &Template) -> Result<()> {
        let columns = serde_json::to_string(&template.columns)?;

        let result = sqlx::query(
            r#"
            INSERT INTO upload_templates
                (template_id, name, version, description, columns, is_active, created_at, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(template.template_id.to_string())
        .bind(&template.name)
        .bind(&template.version)
        .bind(&template.description)
        .bind(columns)
        .bind(template.is_active)
        .bind(format_timestamp(template.created_at))
        .bind(template.created_by.map(|id| id.to_string()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref db)) if db.is_unique_violation() => Err(Error::InvalidInput(format!(
                "Template {} version {} already exists",
                template.name, template.version
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ProjectionStore for SqliteStore {
    async fn load_projection_source(&self) -> Result<Vec<ProjectionSourceRow>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT engagement_data.data_id, engagement_data.file_id, engagement_data.row_number,
                   engagement_data.submission_date, engagement_data.department,
                   engagement_data.category, engagement_data.data_fields,
                   uploaded_files.filename, uploaded_files.template_id,
                   uploaded_files.uploaded_by, uploaded_files.uploader_role,
                   uploaded_files.uploaded_at
            FROM engagement_data
            JOIN uploaded_files ON uploaded_files.file_id = engagement_data.file_id
            WHERE {} AND uploaded_files.status = 'completed'
            ORDER BY uploaded_files.uploaded_at, engagement_data.file_id, engagement_data.row_number
            "#,
            ACTIVE_ROWS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let data_fields: String = row.get("data_fields");
                Ok(ProjectionSourceRow {
                    data_id: row.get("data_id"),
                    file_id: row.get("file_id"),
                    row_number: row.get("row_number"),
                    submission_date: row.get("submission_date"),
                    department: row.get("department"),
                    category: row.get("category"),
                    data_fields: parse_fields(&data_fields)?,
                    filename: row.get("filename"),
                    template_id: row.get("template_id"),
                    uploaded_by: row.get("uploaded_by"),
                    uploader_role: row.get("uploader_role"),
                    uploaded_at: row.get("uploaded_at"),
                })
            })
            .collect()
    }

    async fn load_sensitive_fields(&self) -> Result<HashMap<String, HashSet<String>>> {
        let templates = self.list_templates(true).await?;

        Ok(templates
            .into_iter()
            .map(|t| {
                let sensitive = t.sensitive_columns().map(str::to_string).collect();
                (t.template_id.to_string(), sensitive)
            })
            .collect())
    }

    async fn replace_projections(&self, projections: &ProjectionSet, refreshed_at: DateTime<Utc>) -> Result<()> {
        // Serialize documents BEFORE opening the transaction
        let detailed_fields = projections
            .detailed
            .iter()
            .map(|r| serde_json::to_string(&r.data_fields))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let medium_fields = projections
            .medium
            .iter()
            .map(|r| serde_json::to_string(&r.data_fields))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;

        for table in ["projection_detailed", "projection_medium", "projection_summary"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        let detailed: Vec<(&ProjectionSourceRow, &String)> =
            projections.detailed.iter().zip(detailed_fields.iter()).collect();
        for chunk in detailed.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO projection_detailed (data_id, file_id, row_number, submission_date, \
                 department, category, data_fields, filename, template_id, uploaded_by, \
                 uploader_role, uploaded_at) ",
            );
            builder.push_values(chunk, |mut b, (row, fields)| {
                b.push_bind(row.data_id.clone())
                    .push_bind(row.file_id.clone())
                    .push_bind(row.row_number)
                    .push_bind(row.submission_date.clone())
                    .push_bind(row.department.clone())
                    .push_bind(row.category.clone())
                    .push_bind((*fields).clone())
                    .push_bind(row.filename.clone())
                    .push_bind(row.template_id.clone())
                    .push_bind(row.uploaded_by.clone())
                    .push_bind(row.uploader_role.clone())
                    .push_bind(row.uploaded_at.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        let medium: Vec<(&MediumRecord, &String)> =
            projections.medium.iter().zip(medium_fields.iter()).collect();
        for chunk in medium.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO projection_medium (data_id, file_id, row_number, submission_date, \
                 department, category, data_fields, template_id) ",
            );
            builder.push_values(chunk, |mut b, (row, fields)| {
                b.push_bind(row.data_id.clone())
                    .push_bind(row.file_id.clone())
                    .push_bind(row.row_number)
                    .push_bind(row.submission_date.clone())
                    .push_bind(row.department.clone())
                    .push_bind(row.category.clone())
                    .push_bind((*fields).clone())
                    .push_bind(row.template_id.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        for chunk in projections.summary.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO projection_summary (month, department, category, record_count) ",
            );
            builder.push_values(chunk, |mut b, row: &SummaryRecord| {
                b.push_bind(row.month.clone())
                    .push_bind(row.department.clone())
                    .push_bind(row.category.clone())
                    .push_bind(row.record_count);
            });
            builder.build().execute(&mut *tx).await?;
        }

        sqlx::query(
            "INSERT INTO projection_refreshes (refreshed_at, detailed_rows, medium_rows, summary_rows) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(format_timestamp(refreshed_at))
        .bind(projections.detailed.len() as i64)
        .bind(projections.medium.len() as i64)
        .bind(projections.summary.len() as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM projection_refreshes WHERE refresh_id NOT IN \
             (SELECT refresh_id FROM projection_refreshes ORDER BY refresh_id DESC LIMIT ?)",
        )
        .bind(self.refresh_log_retention)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
