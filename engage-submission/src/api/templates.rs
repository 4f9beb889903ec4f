//! Template endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use engage_common::api::CallerIdentity;
use engage_common::models::{ColumnSpec, Template};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{audit, client_info, require_elevated};
use crate::error::{ApiError, ApiResult};
use crate::store::{AuditAction, AuditEntry, UploadQueries};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListTemplatesParams {
    /// Honored for elevated callers only
    #[serde(default)]
    pub include_inactive: bool,
}

/// GET /templates
pub async fn list_templates(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<ListTemplatesParams>,
) -> ApiResult<Json<Vec<Template>>> {
    let include_inactive = params.include_inactive && caller.is_elevated();
    let templates = state.store.list_templates(include_inactive).await?;
    Ok(Json(templates))
}

async fn load_template(state: &AppState, id: Uuid) -> ApiResult<Template> {
    state
        .store
        .get_template(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Template {}", id)))
}

/// GET /templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Template>> {
    Ok(Json(load_template(&state, id).await?))
}

/// GET /templates/:id/download
///
/// A CSV file holding only the template's header row.
pub async fn download_template(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let template = load_template(&state, id).await?;
    let body = header_csv(&template)?;
    let filename = format!("{}_v{}.csv", template.name, template.version);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            ),
        ],
        body,
    ))
}

fn header_csv(template: &Template) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(template.columns.iter().map(|c| c.name.as_str()))
        .map_err(|e| ApiError::Internal(format!("Failed to write template header: {}", e)))?;
    writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("Failed to write template header: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub columns: Vec<ColumnSpec>,
}

/// POST /templates
pub async fn create_template(
    State(state): State<AppState>,
    caller: CallerIdentity,
    headers: HeaderMap,
    Json(request): Json<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    require_elevated(&caller)?;

    let name = request.name.trim();
    let version = request.version.trim();
    if name.is_empty() || version.is_empty() {
        return Err(ApiError::BadRequest("Template name and version are required".to_string()));
    }

    let mut template = Template::new(name, version, request.columns);
    template.description = request.description;
    template.created_by = Some(caller.user_id);
    template.check_columns()?;

    state.store.create_template(&template).await?;
    info!(template_id = %template.template_id, name = %template.name, version = %template.version, "Template created");

    let (ip, user_agent) = client_info(&headers);
    audit(
        &state,
        AuditEntry::new(AuditAction::TemplateCreated, "upload_templates", template.template_id)
            .by_user(caller.user_id)
            .new_values(json!({
                "name": template.name,
                "version": template.version,
                "columns": template.columns,
            }))
            .from_client(ip, user_agent),
    )
    .await;

    Ok((StatusCode::CREATED, Json(template)))
}

/// Build template routes
pub fn template_routes() -> Router<AppState> {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route("/templates/:id", get(get_template))
        .route("/templates/:id/download", get(download_template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engage_common::models::default_template;

    #[test]
    fn test_header_csv() {
        let body = header_csv(&default_template()).unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), "submission_date,department,category\n");
    }
}
