//! Public dashboard: aggregate counts only

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::queries::{self, MonthlyTotal, SummaryRow};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PublicSummary {
    pub total_records: i64,
    pub rows: Vec<SummaryRow>,
    pub monthly_totals: Vec<MonthlyTotal>,
}

/// GET /public/summary
///
/// No caller identity required.
pub async fn public_summary(State(state): State<AppState>) -> ApiResult<Json<PublicSummary>> {
    let mut tx = state.db.begin().await?;
    let rows = queries::summary_rows(&mut tx).await?;
    let monthly_totals = queries::monthly_totals(&mut tx).await?;
    tx.commit().await?;
    let total_records = rows.iter().map(|r| r.record_count).sum();

    Ok(Json(PublicSummary {
        total_records,
        rows,
        monthly_totals,
    }))
}

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/public/summary", get(public_summary))
}
