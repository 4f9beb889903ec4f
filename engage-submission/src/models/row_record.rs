//! Persisted row-records

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// One stored row: promoted fields plus the open document
#[derive(Debug, Clone, Serialize)]
pub struct StoredRow {
    pub data_id: Uuid,
    pub file_id: Uuid,
    pub row_number: i64,
    pub submission_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub data_fields: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}
