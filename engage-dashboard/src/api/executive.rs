//! Executive dashboard: full detail including uploader provenance

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use engage_common::api::CallerIdentity;
use engage_common::models::AccessTier;
use tracing::debug;

use super::{require_tier, RecordPage, RecordQuery};
use crate::db::queries::{self, DetailedRecord, ExecutiveStats};
use crate::error::ApiResult;
use crate::pagination::Pagination;
use crate::AppState;

/// GET /executive/records
pub async fn executive_records(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<RecordQuery>,
) -> ApiResult<Json<RecordPage<DetailedRecord>>> {
    require_tier(&caller, AccessTier::Elevated)?;

    let filter = query.filter()?;
    // Count and page read one snapshot
    let mut tx = state.db.begin().await?;
    let total = queries::count_records(&mut tx, "projection_detailed", &filter).await?;
    let pagination = Pagination::new(total, query.page);
    let records = queries::detailed_page(&mut tx, &filter, pagination.limit(), pagination.offset()).await?;
    tx.commit().await?;
    debug!(user = %caller.user_id, page = pagination.page, rows = records.len(), "Executive records");

    Ok(Json(RecordPage::new(total, pagination, records)))
}

/// GET /executive/stats
pub async fn executive_stats(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> ApiResult<Json<ExecutiveStats>> {
    require_tier(&caller, AccessTier::Elevated)?;
    let mut tx = state.db.begin().await?;
    let stats = queries::executive_stats(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(stats))
}

pub fn executive_routes() -> Router<AppState> {
    Router::new()
        .route("/executive/records", get(executive_records))
        .route("/executive/stats", get(executive_stats))
}
