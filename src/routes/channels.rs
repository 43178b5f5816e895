//! Team channel REST handlers: chat messages.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use super::auth::AuthUser;
use super::payload;
use crate::frame::{self, Data};
use crate::room::RoomId;
use crate::services::channel::{self, ChannelError, MessageRow};
use crate::services::mention;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PostMessageBody {
    pub body: String,
    #[serde(default)]
    pub mentions: Vec<Uuid>,
}

pub(crate) fn channel_error_to_status(err: ChannelError) -> StatusCode {
    match err {
        ChannelError::ChannelNotFound(_) | ChannelError::MessageNotFound(_) => StatusCode::NOT_FOUND,
        ChannelError::NotParticipant(_) | ChannelError::NotAuthor(_) => StatusCode::FORBIDDEN,
        ChannelError::Invalid(_) => StatusCode::BAD_REQUEST,
        ChannelError::Database(e) => {
            error!(error = %e, "api: channel query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `POST /api/channels/{channel_id}/messages`
pub async fn post_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<PostMessageBody>,
) -> Result<(StatusCode, Json<MessageRow>), StatusCode> {
    let message = channel::post_message(&state.pool, &auth.principal, channel_id, &body.body)
        .await
        .map_err(channel_error_to_status)?;

    state
        .coordinator
        .broadcast_message_created(channel_id, payload(&message))
        .await;

    if let Err(e) = mention::notify_mentions(
        &state.pool,
        &state.coordinator,
        &auth.principal,
        &body.mentions,
        &RoomId::team(channel_id),
        message.id,
        &message.body,
    )
    .await
    {
        warn!(error = %e, message_id = %message.id, "api: mention fan-out failed");
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// `DELETE /api/channels/{channel_id}/messages/{message_id}`
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, StatusCode> {
    channel::delete_message(&state.pool, &auth.principal, channel_id, message_id)
        .await
        .map_err(channel_error_to_status)?;

    let mut data = Data::new();
    data.insert("channelId".into(), json!(channel_id));
    data.insert("messageId".into(), json!(message_id));
    state
        .coordinator
        .emit_to_room(&RoomId::team(channel_id), frame::MESSAGE_DELETED, data)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "channels_test.rs"]
mod tests;
