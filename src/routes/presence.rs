//! Presence snapshot for clients that render a room before joining it.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    pub room: String,
    pub active_users: Vec<Uuid>,
}

/// `GET /api/presence/{room}`: active users, if the caller may join the room.
pub async fn room_presence(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room): Path<String>,
) -> Result<Json<PresenceResponse>, StatusCode> {
    let (room, active_users) = state
        .coordinator
        .room_presence(&auth.principal, &room)
        .await
        .map_err(|_| StatusCode::FORBIDDEN)?;
    Ok(Json(PresenceResponse { room: room.to_string(), active_users }))
}
