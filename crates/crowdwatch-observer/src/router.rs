//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/alerts` -- `WebSocket` critical alert stream
/// - `GET`/`POST /api/zones`, `PATCH /api/zones/{id}` -- zone admin
/// - `GET`/`POST /api/logs`, `POST /api/logs/{id}/resolve` -- action log
/// - `GET /api/logs/export` -- CSV download
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/alerts", get(ws::ws_alerts))
        // REST API
        .route(
            "/api/zones",
            get(handlers::list_zones).post(handlers::create_zone),
        )
        .route("/api/zones/{id}", patch(handlers::edit_zone))
        .route(
            "/api/logs",
            get(handlers::list_logs).post(handlers::create_log),
        )
        .route("/api/logs/{id}/resolve", post(handlers::resolve_log))
        .route("/api/logs/export", get(handlers::export_logs))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
