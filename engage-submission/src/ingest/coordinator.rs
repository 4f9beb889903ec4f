//! Ingestion coordinator
//!
//! Drives one submitted file from upload record to final status:
//!
//! ```text
//! pending → processing → completed | rejected | failed
//! ```
//!
//! Rows are validated in file order. Accepted rows are buffered and written
//! in batches, one transaction per batch. Counts, notes and the error text
//! are written once when processing ends.

use chrono::Utc;
use engage_common::api::CallerIdentity;
use engage_common::config::IngestConfig;
use engage_common::models::{Template, UploadStatus, DEFAULT_TEMPLATE_ID};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::decoder::{detect_format, file_extension, FileFormat, RowDecoder};
use super::notes::ValidationNotes;
use super::refresher::ProjectionRefresher;
use super::validator::{NormalizedRow, RowValidator, Verdict};
use super::IngestError;
use crate::models::{NewUpload, UploadCompletion};
use crate::store::IngestStore;

/// Uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct SubmittedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SubmittedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Final outcome of one submission
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub upload_id: Uuid,
    pub status: UploadStatus,
    pub rows_processed: i64,
    pub rows_failed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Cause of a `failed` status
    #[serde(skip)]
    pub failure: Option<IngestError>,
}

/// In-flight state of one upload
struct UploadRun {
    upload_id: Uuid,
    status: UploadStatus,
    buffer: Vec<NormalizedRow>,
    rows_processed: i64,
    rows_failed: i64,
    notes: ValidationNotes,
    failure: Option<IngestError>,
}

impl UploadRun {
    fn new(upload_id: Uuid, batch_size: usize, max_notes_len: usize) -> Self {
        Self {
            upload_id,
            status: UploadStatus::Pending,
            buffer: Vec::with_capacity(batch_size),
            rows_processed: 0,
            rows_failed: 0,
            notes: ValidationNotes::new(max_notes_len),
            failure: None,
        }
    }

    fn transition_to(&mut self, next: UploadStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "invalid upload transition {} -> {}",
            self.status,
            next
        );
        debug!(upload_id = %self.upload_id, from = ?self.status, to = ?next, "Upload status transition");
        self.status = next;
    }

    /// Record the first terminal failure; later ones are only logged
    fn fail(&mut self, err: IngestError) {
        match &self.failure {
            None => {
                warn!(upload_id = %self.upload_id, "Upload failed: {}", err);
                self.failure = Some(err);
            }
            Some(first) => {
                warn!(upload_id = %self.upload_id, "Additional failure after {}: {}", first, err);
            }
        }
    }

    fn final_status(&self) -> UploadStatus {
        if self.failure.is_some() {
            UploadStatus::Failed
        } else if self.rows_processed == 0 {
            UploadStatus::Rejected
        } else {
            UploadStatus::Completed
        }
    }
}

pub struct IngestCoordinator {
    store: Arc<dyn IngestStore>,
    refresher: Option<Arc<ProjectionRefresher>>,
    config: IngestConfig,
}

impl IngestCoordinator {
    pub fn new(store: Arc<dyn IngestStore>, config: IngestConfig) -> Self {
        Self {
            store,
            refresher: None,
            config,
        }
    }

    /// Refresh projections after every completed upload
    pub fn with_refresher(mut self, refresher: Arc<ProjectionRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one file under `template_id` (the default template when `None`)
    ///
    /// Caller errors (empty or oversize file, unknown template) return `Err`
    /// without creating an upload record. Every other outcome, including
    /// file-level failures, is reported through the returned summary. `Err`
    /// with [`IngestError::StorageUnavailable`] means the outcome could not
    /// be recorded.
    pub async fn submit(
        &self,
        file: SubmittedFile,
        template_id: Option<Uuid>,
        caller: &CallerIdentity,
    ) -> Result<UploadSummary, IngestError> {
        let SubmittedFile { filename, bytes } = file;

        let size = bytes.len() as u64;
        if size == 0 {
            return Err(IngestError::EmptyFile);
        }
        if size > self.config.max_file_size {
            return Err(IngestError::FileTooLarge {
                size,
                limit: self.config.max_file_size,
            });
        }

        let template_id = template_id.unwrap_or(DEFAULT_TEMPLATE_ID);
        let template = self
            .store
            .get_active_template(template_id)
            .await?
            .ok_or(IngestError::TemplateNotFound(template_id))?;

        let detected = detect_format(&filename, &bytes, &self.config);
        let file_format = match &detected {
            Ok(format) => format.as_str().to_string(),
            Err(_) => file_extension(&filename).unwrap_or_else(|| "unknown".to_string()),
        };

        let upload_id = Uuid::new_v4();
        self.store
            .create_upload(&NewUpload {
                file_id: upload_id,
                filename: filename.clone(),
                file_size: size as i64,
                file_format,
                template_id,
                uploaded_by: caller.user_id,
                uploader_role: caller.role,
                uploaded_at: Utc::now(),
            })
            .await?;

        info!(
            upload_id = %upload_id,
            filename = %filename,
            size,
            template = %template.name,
            "Upload received"
        );

        let mut run = UploadRun::new(upload_id, self.config.batch_size, self.config.max_notes_len);

        match self.store.set_upload_status(upload_id, UploadStatus::Processing).await {
            Ok(()) => {
                run.transition_to(UploadStatus::Processing);
                match detected {
                    Ok(format) => self.process(&mut run, &template, bytes, format).await,
                    Err(e) => run.fail(e.into()),
                }
            }
            Err(e) => run.fail(e.into()),
        }

        self.finish(run).await
    }

    async fn process(&self, run: &mut UploadRun, template: &Template, bytes: Vec<u8>, format: FileFormat) {
        let decoder = match RowDecoder::open(bytes, format, self.config.max_rows_per_file) {
            Ok(decoder) => decoder,
            Err(e) => {
                run.fail(e.into());
                return;
            }
        };
        let validator = RowValidator::new(template, &self.config.date_format);

        for item in decoder {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    run.fail(e.into());
                    break;
                }
            };

            match validator.validate(&record) {
                Verdict::Accepted(row) => {
                    run.buffer.push(row);
                    if run.buffer.len() >= self.config.batch_size {
                        if let Err(e) = self.flush(run).await {
                            run.fail(e);
                            return;
                        }
                    }
                }
                Verdict::Rejected(reasons) => {
                    run.rows_failed += 1;
                    run.notes.record(record.row_number(), &reasons);
                }
            }
        }

        // Rows accepted before a decoder failure are kept
        if let Err(e) = self.flush(run).await {
            run.fail(e);
        }
    }

    async fn flush(&self, run: &mut UploadRun) -> Result<(), IngestError> {
        if run.buffer.is_empty() {
            return Ok(());
        }

        let rows = run.buffer.len();
        let result = self.store.insert_rows(run.upload_id, &run.buffer).await;
        run.buffer.clear();
        result?;

        run.rows_processed += rows as i64;
        debug!(upload_id = %run.upload_id, rows, total = run.rows_processed, "Batch flushed");
        Ok(())
    }

    async fn finish(&self, mut run: UploadRun) -> Result<UploadSummary, IngestError> {
        let status = run.final_status();
        run.transition_to(status);

        let error_message = run.failure.as_ref().map(|e| e.to_string());
        let completion = UploadCompletion {
            status,
            rows_processed: run.rows_processed,
            rows_failed: run.rows_failed,
            error_message: error_message.clone(),
            validation_notes: run.notes.into_option(),
            processed_at: Utc::now(),
        };

        if let Err(e) = self.store.finish_upload(run.upload_id, &completion).await {
            error!(upload_id = %run.upload_id, "Failed to record upload outcome: {}", e);
            return Err(IngestError::StorageUnavailable(e.to_string()));
        }

        info!(
            upload_id = %run.upload_id,
            status = ?status,
            rows_processed = run.rows_processed,
            rows_failed = run.rows_failed,
            "Upload processed"
        );

        if status == UploadStatus::Completed {
            if let Some(refresher) = &self.refresher {
                if let Err(e) = refresher.refresh().await {
                    warn!(upload_id = %run.upload_id, "Projection refresh after upload failed: {}", e);
                }
            }
        }

        Ok(UploadSummary {
            upload_id: run.upload_id,
            status,
            rows_processed: run.rows_processed,
            rows_failed: run.rows_failed,
            error_message,
            failure: run.failure,
        })
    }
}
