//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS and request tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Publish pipeline
        .route(
            "/bots/{bot_id}/publish/{profile}",
            post(handlers::publish::submit_publish),
        )
        .route(
            "/bots/{bot_id}/publish/{profile}/status",
            get(handlers::publish::poll_status),
        )
        .route(
            "/bots/{bot_id}/publish/{profile}/history",
            get(handlers::publish::list_history),
        )
        // Provisioning
        .route("/provision", post(handlers::provision::submit_provision));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
