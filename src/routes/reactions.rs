//! Reaction REST handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use super::auth::AuthUser;
use super::payload;
use crate::services::reaction::{self, ReactionError, ReactionRow, ReactionTarget};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddReactionBody {
    pub target_type: ReactionTarget,
    pub target_id: Uuid,
    pub emoji: String,
}

pub(crate) fn reaction_error_to_status(err: ReactionError) -> StatusCode {
    match err {
        ReactionError::TargetNotFound(_) | ReactionError::NotFound(_) => StatusCode::NOT_FOUND,
        ReactionError::NotAuthor(_) => StatusCode::FORBIDDEN,
        ReactionError::Duplicate => StatusCode::CONFLICT,
        ReactionError::Invalid(_) => StatusCode::BAD_REQUEST,
        ReactionError::Database(e) => {
            error!(error = %e, "api: reaction query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `POST /api/reactions`
pub async fn add_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AddReactionBody>,
) -> Result<(StatusCode, Json<ReactionRow>), StatusCode> {
    let (row, room) =
        reaction::add_reaction(&state.pool, &auth.principal, body.target_type, body.target_id, &body.emoji)
            .await
            .map_err(reaction_error_to_status)?;

    state
        .coordinator
        .broadcast_reaction_added(&room, payload(&row))
        .await;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `DELETE /api/reactions/{reaction_id}`
pub async fn remove_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reaction_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let (row, room) = reaction::remove_reaction(&state.pool, &auth.principal, reaction_id)
        .await
        .map_err(reaction_error_to_status)?;

    if let Some(room) = room {
        state
            .coordinator
            .broadcast_reaction_removed(&room, row.id, row.target_id)
            .await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "reactions_test.rs"]
mod tests;
