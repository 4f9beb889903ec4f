//! Manual projection refresh

use axum::{extract::State, routing::post, Json, Router};
use engage_common::api::CallerIdentity;
use tracing::info;

use super::require_elevated;
use crate::error::ApiResult;
use crate::ingest::RefreshReport;
use crate::AppState;

/// POST /projections/refresh
pub async fn refresh_projections(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> ApiResult<Json<RefreshReport>> {
    require_elevated(&caller)?;
    info!(user = %caller.user_id, "Projection refresh requested");

    let report = state.refresher.refresh().await?;
    Ok(Json(report))
}

/// Build projection routes
pub fn projection_routes() -> Router<AppState> {
    Router::new().route("/projections/refresh", post(refresh_projections))
}
