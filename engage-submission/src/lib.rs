//! engage-submission library - file submission and ingestion service
//!
//! Accepts engagement spreadsheets and delimited files, validates each row
//! against a template, stores accepted rows and keeps the dashboard
//! projections current.

use axum::Router;
use engage_common::config::IngestConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod ingest;
pub mod models;
pub mod store;

pub use error::{ApiError, ApiResult};

use ingest::{IngestCoordinator, ProjectionRefresher};
use store::SqliteStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-write)
    pub db: SqlitePool,
    pub store: Arc<SqliteStore>,
    pub coordinator: Arc<IngestCoordinator>,
    pub refresher: Arc<ProjectionRefresher>,
    pub ingest: Arc<IngestConfig>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, ingest: IngestConfig) -> Self {
        let store = Arc::new(SqliteStore::new(db.clone()));
        let refresher = Arc::new(ProjectionRefresher::new(store.clone()));
        let coordinator = Arc::new(
            IngestCoordinator::new(store.clone(), ingest.clone()).with_refresher(refresher.clone()),
        );

        Self {
            db,
            store,
            coordinator,
            refresher,
            ingest: Arc::new(ingest),
        }
    }
}

/// Build application router
///
/// Every route except `/api/submission/health` requires the gateway
/// identity headers.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(api::upload_routes(&state.ingest))
        .merge(api::upload_query_routes())
        .merge(api::template_routes())
        .merge(api::projection_routes())
        .merge(api::health_routes());

    Router::new()
        .nest("/api/submission", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
