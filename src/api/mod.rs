//! REST API for the operations dashboard.

pub mod handlers;
pub mod service;

pub use service::DashboardService;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(service: Arc<DashboardService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/report", get(handlers::get_report))
        .route("/api/v1/drivers", get(handlers::get_drivers))
        .route("/api/v1/export/:file", get(handlers::get_export))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
