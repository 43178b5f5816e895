//! WebSocket handler: one socket per client connection.
//!
//! DESIGN
//! ======
//! The upgrade is accepted first and the handshake runs on the open socket,
//! so a rejected client receives an `error` event before the close instead
//! of a bare HTTP status. After the handshake the handler enters a
//! `select!` loop:
//! - Incoming client frames → coordinator → one reply to the sender
//! - Frames queued by the registry (broadcasts, pushes) → forward to client
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → authenticate (token from header or `?token=`)
//! 2. Failure → `error` event "Authentication failed" → close
//! 3. Success → coordinator registers the connection and queues `connected`
//! 4. Requests are handled strictly in arrival order
//! 5. Close or send failure → coordinator disconnect (exactly once)

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::coordinator::HandshakeError;
use crate::frame::Frame;
use crate::registry::ConnectionId;
use crate::services::identity::bearer_token;
use crate::state::AppState;

/// Reply text for frames that are not valid JSON envelopes.
pub const INVALID_MESSAGE: &str = "Invalid message";

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = handshake_token(&headers, &params);
    ws.on_upgrade(move |socket| run_ws(socket, state, token))
}

/// Bearer token from the `Authorization` header, else the `token` query
/// parameter. The header wins when both are present.
pub(crate) fn handshake_token(headers: &HeaderMap, params: &HashMap<String, String>) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .or_else(|| params.get("token").map(String::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, token: Option<String>) {
    let principal = match state.coordinator.authenticate(token.as_deref()).await {
        Ok(principal) => principal,
        Err(e) => {
            warn!(error = %e, "ws: handshake failed");
            let _ = send_frame(&mut socket, &Frame::error_event(HandshakeError::CLIENT_MESSAGE)).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    // Per-connection queue for pushes and room broadcasts.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.client_queue_capacity);
    let connection_id = state.coordinator.connect(principal, client_tx).await;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let reply = process_inbound_text(&state, connection_id, &text).await;
                        if send_frame(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    state.coordinator.disconnect(connection_id).await;
}

// =============================================================================
// FRAME HANDLING
// =============================================================================

/// Parse one inbound text frame and produce the reply for the sender.
/// Unparsable input yields an `error` event; the connection stays open.
pub(crate) async fn process_inbound_text(state: &AppState, connection_id: ConnectionId, text: &str) -> Frame {
    let req: Frame = match serde_json::from_str(text) {
        Ok(req) => req,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: invalid inbound frame");
            return Frame::error_event(INVALID_MESSAGE);
        }
    };

    info!(%connection_id, id = %req.id, event = %req.event, "ws: recv frame");
    state.coordinator.handle_request(connection_id, &req).await
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, event = %frame.event, "ws: failed to serialize frame");
            return Ok(());
        }
    };
    debug!(id = %frame.id, event = %frame.event, "ws: send frame");
    socket.send(Message::Text(json.into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
