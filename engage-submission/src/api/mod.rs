//! HTTP API handlers for engage-submission

pub mod health;
pub mod projections;
pub mod templates;
pub mod upload;
pub mod uploads;

pub use health::health_routes;
pub use projections::projection_routes;
pub use templates::template_routes;
pub use upload::upload_routes;
pub use uploads::upload_query_routes;

use axum::http::{header, HeaderMap};
use engage_common::api::CallerIdentity;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::store::AuditEntry;
use crate::AppState;

/// Reject callers below the elevated tier
pub(crate) fn require_elevated(caller: &CallerIdentity) -> ApiResult<()> {
    if caller.is_elevated() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Role '{}' may not perform this operation",
            caller.role
        )))
    }
}

/// Client address (first `x-forwarded-for` hop) and user agent
pub(crate) fn client_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (ip, user_agent)
}

/// Append an audit entry; failures are logged, never returned
pub(crate) async fn audit(state: &AppState, entry: AuditEntry) {
    if let Err(e) = state.store.record_audit(&entry).await {
        warn!(action = entry.action.as_str(), "Failed to write audit entry: {}", e);
    }
}

/// Refresh projections after an administrative change
///
/// Returns whether the refresh succeeded.
pub(crate) async fn refresh_after_change(state: &AppState) -> bool {
    match state.refresher.refresh().await {
        Ok(_) => true,
        Err(e) => {
            warn!("Projection refresh after change failed: {}", e);
            false
        }
    }
}
