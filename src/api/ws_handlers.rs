//! WebSocket admission for the admin, employee and chat hubs
//!
//! Each route validates its routing key before upgrading, then registers the
//! socket's write half with the hub and runs the read loop on the upgrade
//! task until the peer goes away or the hub closes the connection.

use super::handlers::{AppError, RealtimeState};
use crate::hub::{AudienceRegistry, Connection, ConnectionId, Hub, WsConnection};
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, Utf8Bytes},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Event name for messages relayed within a chat room
pub const CHAT_MESSAGE_EVENT: &str = "chat.message";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminQuery {
    /// Informational only; every admin receives every admin event
    pub admin_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    pub room_id: Option<String>,
}

/// A routing key must be present and non-blank.
fn require_key(value: Option<String>, param: &str) -> Result<String, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(AppError::BadRequest(format!("{} is required", param))),
    }
}

/// WebSocket upgrade handler for `/api/ws/admin`
pub async fn ws_admin(
    State(state): State<RealtimeState>,
    Query(query): Query<AdminQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, Response> {
    let ws = ws.map_err(IntoResponse::into_response)?;
    let admin_id = query.admin_id.unwrap_or_default();

    Ok(ws.on_upgrade(move |socket| async move {
        debug!(admin_id = %admin_id, "Admin socket upgraded");
        let (sink, stream) = socket.split();
        let shutdown = state.shutdown.child_token();
        let conn = WsConnection::new(sink, shutdown.clone(), state.write_timeout);
        attach(
            state.hubs.admin.clone(),
            (),
            Box::new(conn),
            stream,
            shutdown,
            state.ping_interval,
            discard_inbound,
        )
        .await;
    }))
}

/// WebSocket upgrade handler for `/api/ws/employee?employeeId=`
pub async fn ws_employee(
    State(state): State<RealtimeState>,
    Query(query): Query<EmployeeQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, Response> {
    let employee_id =
        require_key(query.employee_id, "employeeId").map_err(IntoResponse::into_response)?;
    let ws = ws.map_err(IntoResponse::into_response)?;

    Ok(ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        let shutdown = state.shutdown.child_token();
        let conn = WsConnection::new(sink, shutdown.clone(), state.write_timeout);
        attach(
            state.hubs.employee.clone(),
            employee_id,
            Box::new(conn),
            stream,
            shutdown,
            state.ping_interval,
            discard_inbound,
        )
        .await;
    }))
}

/// WebSocket upgrade handler for `/api/ws/chat?roomId=`
///
/// Text frames from a member are relayed to the whole room, sender included.
pub async fn ws_chat(
    State(state): State<RealtimeState>,
    Query(query): Query<ChatQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, Response> {
    let room_id = require_key(query.room_id, "roomId").map_err(IntoResponse::into_response)?;
    let ws = ws.map_err(IntoResponse::into_response)?;

    Ok(ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        let shutdown = state.shutdown.child_token();
        let conn = WsConnection::new(sink, shutdown.clone(), state.write_timeout);
        let chat = state.hubs.chat.clone();
        let room = room_id.clone();
        attach(
            state.hubs.chat.clone(),
            room_id,
            Box::new(conn),
            stream,
            shutdown,
            state.ping_interval,
            move |text| chat.publish(room.clone(), CHAT_MESSAGE_EVENT, &chat_payload(&room, &text)),
        )
        .await;
    }))
}

/// `data` of a relayed chat message: the inbound JSON when it parses, else
/// the raw text.
pub fn chat_payload(room_id: &str, text: &str) -> Value {
    let message =
        serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()));
    json!({
        "roomId": room_id,
        "message": message,
    })
}

/// Inbound text handler for routes whose clients only listen
pub fn discard_inbound(_text: Utf8Bytes) {}

/// Register `conn` with `hub` and read `inbound` until it ends.
///
/// Every `heartbeat` the hub pings the connection; a ping that cannot be
/// written evicts it. A peer that sends nothing (not even a pong) for two
/// heartbeats is treated as gone.
///
/// The loop stops on end of stream, a Close frame, a read error, a silent
/// peer, or cancellation of `shutdown` (the hub closed the connection or the
/// server is stopping). It then unregisters, which is a no-op if the hub
/// already evicted the connection.
pub(crate) async fn attach<R, S, F>(
    hub: Hub<R>,
    key: R::Key,
    conn: Box<dyn Connection>,
    mut inbound: S,
    shutdown: CancellationToken,
    heartbeat: Duration,
    mut on_text: F,
) where
    R: AudienceRegistry,
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    F: FnMut(Utf8Bytes),
{
    let id = ConnectionId::new();
    hub.register(id, key.clone(), conn);
    debug!(hub = %hub.name(), connection_id = %id, key = ?key, "WebSocket client connected");

    let idle_limit = heartbeat.saturating_mul(2);
    let mut ping_interval = interval(heartbeat);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first immediate tick
    ping_interval.tick().await;
    let mut last_seen = Instant::now();

    loop {
        let msg = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ping_interval.tick() => {
                if last_seen.elapsed() >= idle_limit {
                    debug!(hub = %hub.name(), connection_id = %id, "No traffic from peer, closing");
                    break;
                }
                hub.ping(id, key.clone());
                continue;
            }
            msg = inbound.next() => msg,
        };
        last_seen = Instant::now();
        match msg {
            Some(Ok(Message::Text(text))) => on_text(text),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                debug!(hub = %hub.name(), connection_id = %id, "WebSocket read error: {}", e);
                break;
            }
            // Pings are answered by the transport; pongs only refresh `last_seen`
            Some(Ok(_)) => {}
        }
    }

    hub.unregister(id, key);
    debug!(hub = %hub.name(), connection_id = %id, "WebSocket client disconnected");
}
