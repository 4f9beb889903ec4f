//! Storage interface
//!
//! Three traits, split by caller:
//! - [`IngestStore`]: written to by the ingestion coordinator
//! - [`UploadQueries`]: read and administered through the HTTP API
//! - [`ProjectionStore`]: read and replaced by the projection refresher
//!
//! [`SqliteStore`] implements all three over one `SqlitePool`.

pub mod audit;
pub mod sqlite;

pub use audit::{AuditAction, AuditEntry};
pub use sqlite::{SqliteStore, REFRESH_LOG_RETENTION};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engage_common::models::{Template, UploadStatus};
use engage_common::Result;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::ingest::NormalizedRow;
use crate::models::{NewUpload, ProjectionSet, ProjectionSourceRow, StoredRow, UploadCompletion, UploadDetail, UploadListQuery, UploadPage};

#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Template by id, only if active
    async fn get_active_template(&self, template_id: Uuid) -> Result<Option<Template>>;

    async fn create_upload(&self, upload: &NewUpload) -> Result<()>;

    async fn set_upload_status(&self, file_id: Uuid, status: UploadStatus) -> Result<()>;

    /// Write one batch of accepted rows in a single transaction
    async fn insert_rows(&self, file_id: Uuid, rows: &[NormalizedRow]) -> Result<()>;

    /// Record final status, counts and notes
    async fn finish_upload(&self, file_id: Uuid, completion: &UploadCompletion) -> Result<()>;
}

#[async_trait]
pub trait UploadQueries: Send + Sync {
    async fn get_upload(&self, file_id: Uuid) -> Result<Option<UploadDetail>>;

    async fn list_uploads(&self, query: &UploadListQuery) -> Result<UploadPage>;

    /// Active row-records of one upload in row order
    async fn list_active_rows(&self, file_id: Uuid) -> Result<Vec<StoredRow>>;

    /// Soft-delete rows (all of the upload's rows when `row_numbers` is `None`)
    ///
    /// Returns the number of rows that became inactive.
    async fn deactivate_rows(&self, file_id: Uuid, row_numbers: Option<&[i64]>) -> Result<u64>;

    /// Hard-delete an upload and its row-records; false when it did not exist
    async fn delete_upload(&self, file_id: Uuid) -> Result<bool>;

    async fn list_templates(&self, include_inactive: bool) -> Result<Vec<Template>>;

    /// Template by id, active or not
    async fn get_template(&self, template_id: Uuid) -> Result<Option<Template>>;

    /// Insert a new template; an existing name/version is `InvalidInput`
    async fn create_template(&self, template: &Template) -> Result<()>;
}

#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Active rows of completed uploads, ordered by upload time, upload and row
    async fn load_projection_source(&self) -> Result<Vec<ProjectionSourceRow>>;

    /// Sensitive column names per template id (as stored text)
    async fn load_sensitive_fields(&self) -> Result<HashMap<String, HashSet<String>>>;

    /// Replace all projection content atomically and log the refresh
    async fn replace_projections(&self, projections: &ProjectionSet, refreshed_at: DateTime<Utc>) -> Result<()>;
}
