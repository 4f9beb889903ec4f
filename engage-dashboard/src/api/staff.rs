//! Staff dashboard: row detail without sensitive fields or uploader identity

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use engage_common::api::CallerIdentity;
use engage_common::models::AccessTier;

use super::{require_tier, RecordPage, RecordQuery};
use crate::db::queries::{self, MediumRecord};
use crate::error::ApiResult;
use crate::pagination::Pagination;
use crate::AppState;

/// GET /staff/records
pub async fn staff_records(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<RecordQuery>,
) -> ApiResult<Json<RecordPage<MediumRecord>>> {
    require_tier(&caller, AccessTier::Standard)?;

    let filter = query.filter()?;
    // Count and page read one snapshot
    let mut tx = state.db.begin().await?;
    let total = queries::count_records(&mut tx, "projection_medium", &filter).await?;
    let pagination = Pagination::new(total, query.page);
    let records = queries::medium_page(&mut tx, &filter, pagination.limit(), pagination.offset()).await?;
    tx.commit().await?;

    Ok(Json(RecordPage::new(total, pagination, records)))
}

pub fn staff_routes() -> Router<AppState> {
    Router::new().route("/staff/records", get(staff_records))
}
