//! engage-dashboard library - read-only dashboard service
//!
//! Serves the three projections written by engage-submission, each to the
//! access tier it is meant for.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-only)
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
///
/// Public summary and health need no identity; record views check the
/// caller's tier.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(api::executive_routes())
        .merge(api::staff_routes())
        .merge(api::public_routes())
        .merge(api::health_routes());

    Router::new()
        .nest("/api/dashboard", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
