//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the websocket endpoint, the REST handlers that
//! write helpdesk data and announce it through the coordinator, and a
//! health probe.

pub mod auth;
pub mod channels;
pub mod presence;
pub mod reactions;
pub mod tickets;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .route("/api/tickets/{ticket_id}/notes", post(tickets::create_note))
        .route(
            "/api/tickets/{ticket_id}/notes/{note_id}",
            patch(tickets::update_note).delete(tickets::delete_note),
        )
        .route(
            "/api/tickets/{ticket_id}/subtasks/{subtask_id}",
            patch(tickets::update_subtask).delete(tickets::delete_subtask),
        )
        .route("/api/channels/{channel_id}/messages", post(channels::post_message))
        .route(
            "/api/channels/{channel_id}/messages/{message_id}",
            delete(channels::delete_message),
        )
        .route("/api/reactions", post(reactions::add_reaction))
        .route("/api/reactions/{reaction_id}", delete(reactions::remove_reaction))
        .route("/api/presence/{room}", get(presence::room_presence))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Row → opaque broadcast payload.
pub(crate) fn payload<T: Serialize>(row: &T) -> serde_json::Value {
    serde_json::to_value(row).unwrap_or_default()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
