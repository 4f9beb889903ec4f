//! HTTP API tests for engage-submission
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use engage_common::api::CallerIdentity;
use engage_common::config::IngestConfig;
use engage_common::models::DEFAULT_TEMPLATE_ID;
use engage_submission::{build_router, AppState};
use helpers::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const VALID_CSV: &str = "submission_date,department,category\n2024-01-15,Sales,Survey\n2024-01-16,Sales,Survey\n";

async fn send(state: &AppState, request: Request<Body>) -> Response {
    build_router(state.clone()).oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn upload_request(caller: Option<&CallerIdentity>, filename: &str, bytes: &[u8], template_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/submission/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        );
    if let Some(caller) = caller {
        builder = with_identity(builder, caller);
    }
    builder
        .body(Body::from(multipart_body(filename, bytes, template_id)))
        .unwrap()
}

fn get(caller: &CallerIdentity, uri: &str) -> Request<Body> {
    with_identity(Request::builder().uri(uri), caller)
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, caller: &CallerIdentity, uri: &str, body: Value) -> Request<Body> {
    with_identity(Request::builder().method(method).uri(uri), caller)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn setup() -> (tempfile::TempDir, AppState) {
    let (dir, pool) = create_test_db().await.unwrap();
    (dir, create_test_state(pool, ingest_config()))
}

/// Upload `VALID_CSV` as `caller` and return the upload id
async fn upload_valid(state: &AppState, caller: &CallerIdentity) -> String {
    let response = send(state, upload_request(Some(caller), "valid.csv", VALID_CSV.as_bytes(), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["upload_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let (_dir, state) = setup().await;
    let request = Request::builder()
        .uri("/api/submission/health")
        .body(Body::empty())
        .unwrap();

    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "engage-submission");
}

#[tokio::test]
async fn test_upload_requires_identity() {
    let (_dir, state) = setup().await;

    let response = send(&state, upload_request(None, "valid.csv", VALID_CSV.as_bytes(), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_upload_completed() {
    let (_dir, state) = setup().await;
    let caller = staff();

    let response = send(
        &state,
        upload_request(Some(&caller), "valid.csv", VALID_CSV.as_bytes(), Some(&DEFAULT_TEMPLATE_ID.to_string())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["rows_processed"], 2);
    assert_eq!(body["rows_failed"], 0);
    assert!(body.get("error_message").is_none());

    let audits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE action = 'FILE_UPLOADED'")
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(audits, 1);
}

#[tokio::test]
async fn test_upload_rejected_and_failed_are_unprocessable() {
    let (_dir, state) = setup().await;
    let caller = staff();

    let rejected = "submission_date,department,category\n,Sales,Survey\n";
    let response = send(&state, upload_request(Some(&caller), "r.csv", rejected.as_bytes(), None)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["status"], "rejected");

    let response = send(&state, upload_request(Some(&caller), "r.txt", b"hello there", None)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert!(body["error_message"].as_str().unwrap().contains("Unsupported"));
}

#[tokio::test]
async fn test_upload_over_size_limit() {
    let (dir, pool) = create_test_db().await.unwrap();
    let config = IngestConfig {
        max_file_size: 32,
        ..ingest_config()
    };
    let state = create_test_state(pool, config);

    let response = send(&state, upload_request(Some(&staff()), "valid.csv", VALID_CSV.as_bytes(), None)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(count_rows(&state.db, "uploaded_files").await, 0);
    drop(dir);
}

#[tokio::test]
async fn test_upload_unknown_template() {
    let (_dir, state) = setup().await;

    let response = send(
        &state,
        upload_request(
            Some(&staff()),
            "valid.csv",
            VALID_CSV.as_bytes(),
            Some("00000000-0000-0000-0000-000000000042"),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(count_rows(&state.db, "uploaded_files").await, 0);
}

#[tokio::test]
async fn test_upload_missing_file_part() {
    let (_dir, state) = setup().await;
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"template_id\"\r\n\r\n{id}\r\n--{b}--\r\n",
        b = MULTIPART_BOUNDARY,
        id = DEFAULT_TEMPLATE_ID
    );
    let request = with_identity(
        Request::builder()
            .method("POST")
            .uri("/api/submission/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            ),
        &staff(),
    )
    .body(Body::from(body))
    .unwrap();

    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_listing_is_scoped_to_owner() {
    let (_dir, state) = setup().await;
    let alice = staff();
    let bob = staff();
    upload_valid(&state, &alice).await;

    let body = body_json(send(&state, get(&alice, "/api/submission/uploads")).await).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["uploads"][0]["uploaded_by"], alice.user_id.to_string());

    let body = body_json(send(&state, get(&bob, "/api/submission/uploads")).await).await;
    assert_eq!(body["total"], 0);

    let body = body_json(send(&state, get(&admin(), "/api/submission/uploads?status=completed")).await).await;
    assert_eq!(body["total"], 1);

    let body = body_json(send(&state, get(&admin(), "/api/submission/uploads?status=failed")).await).await;
    assert_eq!(body["total"], 0);

    let response = send(&state, get(&admin(), "/api/submission/uploads?status=bogus")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_detail_and_rows_visibility() {
    let (_dir, state) = setup().await;
    let owner = staff();
    let id = upload_valid(&state, &owner).await;

    let response = send(&state, get(&owner, &format!("/api/submission/uploads/{}", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["filename"], "valid.csv");
    assert_eq!(detail["file_format"], "csv");
    assert_eq!(detail["active_records"], 2);
    assert_eq!(detail["template_id"], DEFAULT_TEMPLATE_ID.to_string());

    let response = send(&state, get(&staff(), &format!("/api/submission/uploads/{}", id))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&state, get(&admin(), &format!("/api/submission/uploads/{}/rows", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rows = body_json(response).await;
    assert_eq!(rows["count"], 2);
    assert_eq!(rows["rows"][0]["row_number"], 2);
    assert_eq!(rows["rows"][0]["submission_date"], "2024-01-15");
    assert_eq!(rows["rows"][1]["department"], "Sales");

    let missing = "00000000-0000-0000-0000-000000000099";
    let response = send(&state, get(&admin(), &format!("/api/submission/uploads/{}", missing))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deactivate_requires_elevated() {
    let (_dir, state) = setup().await;
    let owner = staff();
    let id = upload_valid(&state, &owner).await;
    let uri = format!("/api/submission/uploads/{}/deactivate", id);

    let response = send(&state, send_json("POST", &owner, &uri, json!({"row_numbers": [2]}))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&state, send_json("POST", &admin(), &uri, json!({"row_numbers": [2]}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["rows_deactivated"], 1);
    assert_eq!(body["projections_refreshed"], true);

    assert_eq!(count_rows(&state.db, "projection_detailed").await, 1);
    let audits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE action = 'ROWS_DEACTIVATED'")
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(audits, 1);

    // No body deactivates everything left
    let request = with_identity(Request::builder().method("POST").uri(&uri), &admin())
        .body(Body::empty())
        .unwrap();
    let body = body_json(send(&state, request).await).await;
    assert_eq!(body["rows_deactivated"], 1);
    assert_eq!(count_rows(&state.db, "projection_detailed").await, 0);
}

#[tokio::test]
async fn test_delete_upload() {
    let (_dir, state) = setup().await;
    let owner = staff();
    let id = upload_valid(&state, &owner).await;
    let uri = format!("/api/submission/uploads/{}", id);

    let delete = |caller: &CallerIdentity| {
        with_identity(Request::builder().method("DELETE").uri(&uri), caller)
            .body(Body::empty())
            .unwrap()
    };

    let response = send(&state, delete(&owner)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&state, delete(&admin())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], true);

    assert_eq!(count_rows(&state.db, "engagement_data").await, 0);
    assert_eq!(count_rows(&state.db, "projection_detailed").await, 0);

    let response = send(&state, delete(&admin())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_templates() {
    let (_dir, state) = setup().await;

    let response = send(&state, get(&staff(), "/api/submission/templates")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["name"], "engagement_default");

    let uri = format!("/api/submission/templates/{}/download", DEFAULT_TEMPLATE_ID);
    let response = send(&state, get(&staff(), &uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"submission_date,department,category\n");

    let new_template = json!({
        "name": "workshops",
        "version": "1.0",
        "columns": [
            {"name": "submission_date", "type": "date", "required": true},
            {"name": "department", "type": "text", "required": true},
            {"name": "category", "type": "text", "allowed_values": ["Workshop", "Event"]},
            {"name": "attendees", "type": "number"}
        ]
    });

    let response = send(&state, send_json("POST", &staff(), "/api/submission/templates", new_template.clone())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&state, send_json("POST", &admin(), "/api/submission/templates", new_template.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["columns"][2]["allowed_values"], json!(["Workshop", "Event"]));

    let response = send(
        &state,
        get(&staff(), &format!("/api/submission/templates/{}", created["template_id"].as_str().unwrap())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&state, send_json("POST", &admin(), "/api/submission/templates", new_template)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let duplicate_columns = json!({
        "name": "broken",
        "version": "1.0",
        "columns": [
            {"name": "hours", "type": "number"},
            {"name": "hours", "type": "number"}
        ]
    });
    let response = send(&state, send_json("POST", &admin(), "/api/submission/templates", duplicate_columns)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_manual_refresh_requires_elevated() {
    let (_dir, state) = setup().await;
    upload_valid(&state, &staff()).await;

    let request = |caller: &CallerIdentity| {
        with_identity(
            Request::builder().method("POST").uri("/api/submission/projections/refresh"),
            caller,
        )
        .body(Body::empty())
        .unwrap()
    };

    let response = send(&state, request(&public_user())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&state, request(&admin())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["detailed_rows"], 2);
    assert_eq!(report["summary_rows"], 1);
}
