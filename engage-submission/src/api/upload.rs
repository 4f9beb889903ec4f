//! File upload endpoint
//!
//! `POST /api/submission/upload` takes a multipart body with a `file` part
//! and an optional `template_id` part.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use engage_common::api::CallerIdentity;
use engage_common::config::IngestConfig;
use engage_common::models::UploadStatus;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{audit, client_info};
use crate::error::{ApiError, ApiResult};
use crate::ingest::{IngestError, SubmittedFile, UploadSummary};
use crate::store::{AuditAction, AuditEntry};
use crate::AppState;

/// Room for multipart boundaries and the non-file parts
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// POST /upload
pub async fn upload_file(
    State(state): State<AppState>,
    caller: CallerIdentity,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadSummary>)> {
    let mut file: Option<SubmittedFile> = None;
    let mut template_id: Option<Uuid> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("File part has no filename".to_string()))?;
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some(SubmittedFile::new(filename, bytes.to_vec()));
            }
            Some("template_id") => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    let id = Uuid::parse_str(text)
                        .map_err(|_| ApiError::BadRequest(format!("Invalid template_id: {}", text)))?;
                    template_id = Some(id);
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("Missing 'file' part".to_string()))?;
    let filename = file.filename.clone();
    let file_size = file.bytes.len();

    info!(user = %caller.user_id, filename = %filename, size = file_size, "Upload requested");

    let summary = state.coordinator.submit(file, template_id, &caller).await?;

    let (ip, user_agent) = client_info(&headers);
    audit(
        &state,
        AuditEntry::new(AuditAction::FileUploaded, "uploaded_files", summary.upload_id)
            .by_user(caller.user_id)
            .new_values(json!({
                "filename": filename,
                "file_size": file_size,
                "status": summary.status,
                "rows_processed": summary.rows_processed,
                "rows_failed": summary.rows_failed,
            }))
            .from_client(ip, user_agent),
    )
    .await;

    Ok((summary_status(&summary), Json(summary)))
}

/// HTTP status reported for a finished upload
fn summary_status(summary: &UploadSummary) -> StatusCode {
    match (summary.status, &summary.failure) {
        (UploadStatus::Completed, _) => StatusCode::OK,
        (_, Some(IngestError::StorageUnavailable(_))) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Build upload routes
pub fn upload_routes(config: &IngestConfig) -> Router<AppState> {
    let body_limit = usize::try_from(config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/upload", post(upload_file))
        .layer(DefaultBodyLimit::max(body_limit))
}
