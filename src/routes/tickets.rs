//! Ticket REST handlers: notes and checklist items.
//!
//! Each successful write is announced to `ticket:<id>` after the database
//! commit. Mentions are best effort: a failed fan-out is logged and the
//! write still succeeds.

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
use crate::services::mention;
use crate::services::ticket::{self, NoteRow, SubtaskRow, TicketError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateNoteBody {
    pub body: String,
    #[serde(default)]
    pub mentions: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateNoteBody {
    pub body: String,
}

#[derive(Deserialize)]
pub struct UpdateSubtaskBody {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

pub(crate) fn ticket_error_to_status(err: TicketError) -> StatusCode {
    match err {
        TicketError::TicketNotFound(_) | TicketError::NoteNotFound(_) | TicketError::SubtaskNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        TicketError::NotAuthor(_) => StatusCode::FORBIDDEN,
        TicketError::Invalid(_) => StatusCode::BAD_REQUEST,
        TicketError::Database(e) => {
            error!(error = %e, "api: ticket query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// NOTES
// =============================================================================

/// `POST /api/tickets/{ticket_id}/notes`
pub async fn create_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<CreateNoteBody>,
) -> Result<(StatusCode, Json<NoteRow>), StatusCode> {
    let note = ticket::create_note(&state.pool, &auth.principal, ticket_id, &body.body)
        .await
        .map_err(ticket_error_to_status)?;

    state
        .coordinator
        .broadcast_note_created(ticket_id, payload(&note))
        .await;

    if let Err(e) = mention::notify_mentions(
        &state.pool,
        &state.coordinator,
        &auth.principal,
        &body.mentions,
        &RoomId::ticket(ticket_id),
        note.id,
        &note.body,
    )
    .await
    {
        warn!(error = %e, note_id = %note.id, "api: mention fan-out failed");
    }

    Ok((StatusCode::CREATED, Json(note)))
}

/// `PATCH /api/tickets/{ticket_id}/notes/{note_id}`
pub async fn update_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((ticket_id, note_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateNoteBody>,
) -> Result<Json<NoteRow>, StatusCode> {
    let note = ticket::update_note(&state.pool, &auth.principal, ticket_id, note_id, &body.body)
        .await
        .map_err(ticket_error_to_status)?;

    state
        .coordinator
        .broadcast_note_updated(ticket_id, payload(&note))
        .await;
    Ok(Json(note))
}

/// `DELETE /api/tickets/{ticket_id}/notes/{note_id}`
pub async fn delete_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((ticket_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, StatusCode> {
    ticket::delete_note(&state.pool, &auth.principal, ticket_id, note_id)
        .await
        .map_err(ticket_error_to_status)?;

    state
        .coordinator
        .broadcast_note_deleted(ticket_id, note_id)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// SUBTASKS
// =============================================================================

/// `PATCH /api/tickets/{ticket_id}/subtasks/{subtask_id}`
pub async fn update_subtask(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((ticket_id, subtask_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateSubtaskBody>,
) -> Result<Json<SubtaskRow>, StatusCode> {
    if body.title.is_none() && body.completed.is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let subtask = ticket::update_subtask(
        &state.pool,
        &auth.principal,
        ticket_id,
        subtask_id,
        body.title.as_deref(),
        body.completed,
    )
    .await
    .map_err(ticket_error_to_status)?;

    state
        .coordinator
        .broadcast_checklist_updated(ticket_id, payload(&subtask))
        .await;
    Ok(Json(subtask))
}

/// `DELETE /api/tickets/{ticket_id}/subtasks/{subtask_id}`
pub async fn delete_subtask(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((ticket_id, subtask_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, StatusCode> {
    ticket::delete_subtask(&state.pool, &auth.principal, ticket_id, subtask_id)
        .await
        .map_err(ticket_error_to_status)?;

    state
        .coordinator
        .emit_to_room(&RoomId::ticket(ticket_id), frame::SUBTASK_DELETED, subtask_deleted_data(ticket_id, subtask_id))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

fn subtask_deleted_data(ticket_id: Uuid, subtask_id: Uuid) -> Data {
    let mut data = Data::new();
    data.insert("ticketId".into(), json!(ticket_id));
    data.insert("subtaskId".into(), json!(subtask_id));
    data
}

#[cfg(test)]
#[path = "tickets_test.rs"]
mod tests;
