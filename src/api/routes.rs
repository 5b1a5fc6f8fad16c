use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // A form carries a manual and a logo, each capped individually
    let upload_limit = (state.config.max_upload_size as usize)
        .saturating_mul(2)
        .saturating_add(1024 * 1024);

    Router::new()
        // Manuals
        .route("/api/files", get(handlers::list_manuals))
        .route("/api/files/:id", delete(handlers::delete_manual))
        .route("/api/files/:id", get(handlers::get_manual))
        .route("/api/files/:id", put(handlers::rename_manual))
        .route(
            "/api/files/:id/replace",
            post(handlers::replace_manual).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/upload",
            post(handlers::upload_manual).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/manifest", get(handlers::get_manifest))
        .route("/api/health", get(handlers::health))
        // Public downloads
        .route("/files/:filename", get(handlers::serve_file))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
