//! Upload records

use chrono::{DateTime, Utc};
use engage_common::models::{UploadStatus, UserRole};
use serde::Serialize;
use uuid::Uuid;

/// Upload record as first written, in `pending`
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub file_format: String,
    pub template_id: Uuid,
    pub uploaded_by: Uuid,
    pub uploader_role: UserRole,
    pub uploaded_at: DateTime<Utc>,
}

/// Final outcome, written once when processing ends
#[derive(Debug, Clone)]
pub struct UploadCompletion {
    pub status: UploadStatus,
    pub rows_processed: i64,
    pub rows_failed: i64,
    pub error_message: Option<String>,
    pub validation_notes: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// Upload as returned by the query API
#[derive(Debug, Clone, Serialize)]
pub struct UploadDetail {
    pub upload_id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub file_format: String,
    pub template_id: Uuid,
    pub uploaded_by: Uuid,
    pub uploader_role: UserRole,
    pub status: UploadStatus,
    pub rows_processed: i64,
    pub rows_failed: i64,
    pub error_message: Option<String>,
    pub validation_notes: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Row-records not soft-deleted
    pub active_records: i64,
}

/// Filters for listing uploads
#[derive(Debug, Clone)]
pub struct UploadListQuery {
    /// Restrict to one uploader
    pub owner: Option<Uuid>,
    pub status: Option<UploadStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for UploadListQuery {
    fn default() -> Self {
        Self {
            owner: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadPage {
    pub uploads: Vec<UploadDetail>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
