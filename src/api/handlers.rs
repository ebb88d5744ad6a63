//! Shared server state, health and HTTP error mapping

use crate::events::{ListenerSession, SessionState};
use crate::hub::{HubSet, HubSetStats};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Shared server state
pub struct ServerState {
    pub hubs: HubSet,
    /// Snapshot of the change listener, for health reporting
    pub listener: watch::Receiver<ListenerSession>,
    /// Root token; every connection reader runs on a child of it
    pub shutdown: CancellationToken,
    /// Bound on a single outbound WebSocket write
    pub write_timeout: Duration,
    /// Cadence of server pings on every WebSocket
    pub ping_interval: Duration,
}

pub type RealtimeState = Arc<ServerState>;

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub hubs: HubSetStats,
    pub listener: ListenerSession,
}

/// Health check handler.
///
/// Returns:
/// - 200 + `"ok"` while the listener is subscribed
/// - 503 + `"unhealthy"` once it has unsubscribed (shutting down)
pub async fn health(State(state): State<RealtimeState>) -> (StatusCode, Json<HealthResponse>) {
    let hubs = state.hubs.stats().await;
    let listener = state.listener.borrow().clone();

    let (http_status, status) = match listener.state {
        SessionState::Subscribed => (StatusCode::OK, "ok"),
        SessionState::Unsubscribed => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            hubs,
            listener,
        }),
    )
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
