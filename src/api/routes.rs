//! API route definitions

use super::handlers::{self, RealtimeState};
use super::ws_handlers;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: RealtimeState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Realtime WebSockets
        // ====================================================================
        .route("/api/ws/admin", get(ws_handlers::ws_admin))
        .route("/api/ws/employee", get(ws_handlers::ws_employee))
        .route("/api/ws/chat", get(ws_handlers::ws_chat))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
