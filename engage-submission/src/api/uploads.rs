//! Upload queries and administration
//!
//! Non-elevated callers only see uploads they submitted. Deactivation and
//! deletion require the elevated tier and refresh the projections.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use engage_common::api::CallerIdentity;
use engage_common::models::UploadStatus;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{audit, client_info, refresh_after_change, require_elevated};
use crate::error::{ApiError, ApiResult};
use crate::models::{StoredRow, UploadDetail, UploadListQuery, UploadPage};
use crate::store::{AuditAction, AuditEntry, UploadQueries};
use crate::AppState;

const MAX_PAGE_LIMIT: i64 = 500;

/// Query parameters for GET /uploads
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListParams {
    fn into_query(self, caller: &CallerIdentity) -> ApiResult<UploadListQuery> {
        let defaults = UploadListQuery::default();
        let status = self
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<UploadStatus>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        Ok(UploadListQuery {
            owner: (!caller.is_elevated()).then_some(caller.user_id),
            status,
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

/// GET /uploads
pub async fn list_uploads(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<UploadPage>> {
    let query = params.into_query(&caller)?;
    let page = state.store.list_uploads(&query).await?;
    Ok(Json(page))
}

/// Load an upload the caller is allowed to see
async fn visible_upload(state: &AppState, caller: &CallerIdentity, id: Uuid) -> ApiResult<UploadDetail> {
    let upload = state
        .store
        .get_upload(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Upload {}", id)))?;

    if !caller.can_view_owned_by(upload.uploaded_by) {
        return Err(ApiError::Forbidden(format!("Upload {} belongs to another user", id)));
    }

    Ok(upload)
}

/// GET /uploads/:id
pub async fn get_upload(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UploadDetail>> {
    let upload = visible_upload(&state, &caller, id).await?;
    Ok(Json(upload))
}

#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub upload_id: Uuid,
    pub count: usize,
    pub rows: Vec<StoredRow>,
}

/// GET /uploads/:id/rows
pub async fn list_rows(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RowsResponse>> {
    visible_upload(&state, &caller, id).await?;
    let rows = state.store.list_active_rows(id).await?;
    Ok(Json(RowsResponse {
        upload_id: id,
        count: rows.len(),
        rows,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeactivateRequest {
    /// Rows to deactivate; every row of the upload when absent
    pub row_numbers: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub upload_id: Uuid,
    pub rows_deactivated: u64,
    pub projections_refreshed: bool,
}

/// POST /uploads/:id/deactivate
pub async fn deactivate_rows(
    State(state): State<AppState>,
    caller: CallerIdentity,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Option<Json<DeactivateRequest>>,
) -> ApiResult<Json<DeactivateResponse>> {
    require_elevated(&caller)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    if state.store.get_upload(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Upload {}", id)));
    }

    let rows_deactivated = state
        .store
        .deactivate_rows(id, request.row_numbers.as_deref())
        .await?;
    info!(upload_id = %id, rows = rows_deactivated, "Rows deactivated");

    let (ip, user_agent) = client_info(&headers);
    audit(
        &state,
        AuditEntry::new(AuditAction::RowsDeactivated, "engagement_data", id)
            .by_user(caller.user_id)
            .new_values(json!({
                "row_numbers": request.row_numbers,
                "rows_deactivated": rows_deactivated,
            }))
            .from_client(ip, user_agent),
    )
    .await;

    let projections_refreshed = refresh_after_change(&state).await;

    Ok(Json(DeactivateResponse {
        upload_id: id,
        rows_deactivated,
        projections_refreshed,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub upload_id: Uuid,
    pub deleted: bool,
    pub projections_refreshed: bool,
}

/// DELETE /uploads/:id
pub async fn delete_upload(
    State(state): State<AppState>,
    caller: CallerIdentity,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    require_elevated(&caller)?;

    let upload = state
        .store
        .get_upload(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Upload {}", id)))?;

    if !state.store.delete_upload(id).await? {
        return Err(ApiError::NotFound(format!("Upload {}", id)));
    }
    info!(upload_id = %id, filename = %upload.filename, "Upload deleted");

    let (ip, user_agent) = client_info(&headers);
    audit(
        &state,
        AuditEntry::new(AuditAction::FileDeleted, "uploaded_files", id)
            .by_user(caller.user_id)
            .old_values(json!({
                "filename": upload.filename,
                "uploaded_by": upload.uploaded_by,
                "status": upload.status,
                "rows_processed": upload.rows_processed,
            }))
            .from_client(ip, user_agent),
    )
    .await;

    let projections_refreshed = refresh_after_change(&state).await;

    Ok(Json(DeleteResponse {
        upload_id: id,
        deleted: true,
        projections_refreshed,
    }))
}

/// Build upload query and administration routes
pub fn upload_query_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads", get(list_uploads))
        .route("/uploads/:id", get(get_upload).delete(delete_upload))
        .route("/uploads/:id/rows", get(list_rows))
        .route("/uploads/:id/deactivate", post(deactivate_rows))
}
