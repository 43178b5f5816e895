//! Ticket service: notes and checklist items.
//!
//! Every query is scoped to the caller's tenant through the parent ticket.
//! A ticket, note or subtask outside that tenant is reported as not found.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::principal::Principal;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket not found: {0}")]
    TicketNotFound(Uuid),
    #[error("note not found: {0}")]
    NoteNotFound(Uuid),
    #[error("subtask not found: {0}")]
    SubtaskNotFound(Uuid),
    #[error("only the author may change note {0}")]
    NotAuthor(Uuid),
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for TicketError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TicketNotFound(_) => "E_TICKET_NOT_FOUND",
            Self::NoteNotFound(_) => "E_NOTE_NOT_FOUND",
            Self::SubtaskNotFound(_) => "E_SUBTASK_NOT_FOUND",
            Self::NotAuthor(_) => "E_NOT_AUTHOR",
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRow {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskRow {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub position: i32,
    pub updated_at: DateTime<Utc>,
}

type NoteTuple = (Uuid, Uuid, Uuid, String, DateTime<Utc>, DateTime<Utc>);
type SubtaskTuple = (Uuid, Uuid, String, bool, i32, DateTime<Utc>);

fn note_from((id, ticket_id, author_id, body, created_at, updated_at): NoteTuple) -> NoteRow {
    NoteRow { id, ticket_id, author_id, body, created_at, updated_at }
}

fn subtask_from((id, ticket_id, title, completed, position, updated_at): SubtaskTuple) -> SubtaskRow {
    SubtaskRow { id, ticket_id, title, completed, position, updated_at }
}

/// Trimmed, non-empty note body.
///
/// # Errors
///
/// Returns `Invalid` for blank bodies.
pub fn normalize_body(body: &str) -> Result<&str, TicketError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(TicketError::Invalid("body must not be empty"));
    }
    Ok(body)
}

// =============================================================================
// TICKETS
// =============================================================================

/// Fail unless `ticket_id` exists under the principal's tenant.
///
/// # Errors
///
/// Returns `TicketNotFound` or a database error.
pub async fn ensure_ticket(pool: &PgPool, principal: &Principal, ticket_id: Uuid) -> Result<(), TicketError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tickets WHERE id = $1 AND tenant_id = $2)")
        .bind(ticket_id)
        .bind(principal.tenant_id)
        .fetch_one(pool)
        .await?;
    if exists { Ok(()) } else { Err(TicketError::TicketNotFound(ticket_id)) }
}

// =============================================================================
// NOTES
// =============================================================================

/// Add a note authored by `principal`.
///
/// # Errors
///
/// Returns `Invalid`, `TicketNotFound`, or a database error.
pub async fn create_note(
    pool: &PgPool,
    principal: &Principal,
    ticket_id: Uuid,
    body: &str,
) -> Result<NoteRow, TicketError> {
    let body = normalize_body(body)?;
    ensure_ticket(pool, principal, ticket_id).await?;

    let row = sqlx::query_as::<_, NoteTuple>(
        "INSERT INTO ticket_notes (id, ticket_id, author_id, body)
         VALUES ($1, $2, $3, $4)
         RETURNING id, ticket_id, author_id, body, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(ticket_id)
    .bind(principal.id)
    .bind(body)
    .fetch_one(pool)
    .await?;
    Ok(note_from(row))
}

/// Load a note of a ticket in the principal's tenant.
async fn load_note(pool: &PgPool, principal: &Principal, ticket_id: Uuid, note_id: Uuid) -> Result<NoteRow, TicketError> {
    sqlx::query_as::<_, NoteTuple>(
        "SELECT n.id, n.ticket_id, n.author_id, n.body, n.created_at, n.updated_at
         FROM ticket_notes n
         JOIN tickets t ON t.id = n.ticket_id
         WHERE n.id = $1 AND n.ticket_id = $2 AND t.tenant_id = $3",
    )
    .bind(note_id)
    .bind(ticket_id)
    .bind(principal.tenant_id)
    .fetch_optional(pool)
    .await?
    .map(note_from)
    .ok_or(TicketError::NoteNotFound(note_id))
}

/// Replace the body of a note. Author only.
///
/// # Errors
///
/// Returns `Invalid`, `NoteNotFound`, `NotAuthor`, or a database error.
pub async fn update_note(
    pool: &PgPool,
    principal: &Principal,
    ticket_id: Uuid,
    note_id: Uuid,
    body: &str,
) -> Result<NoteRow, TicketError> {
    let body = normalize_body(body)?;
    let note = load_note(pool, principal, ticket_id, note_id).await?;
    if note.author_id != principal.id {
        return Err(TicketError::NotAuthor(note_id));
    }

    let row = sqlx::query_as::<_, NoteTuple>(
        "UPDATE ticket_notes SET body = $2, updated_at = now()
         WHERE id = $1
         RETURNING id, ticket_id, author_id, body, created_at, updated_at",
    )
    .bind(note_id)
    .bind(body)
    .fetch_one(pool)
    .await?;
    Ok(note_from(row))
}

/// Delete a note. Author only.
///
/// # Errors
///
/// Returns `NoteNotFound`, `NotAuthor`, or a database error.
pub async fn delete_note(pool: &PgPool, principal: &Principal, ticket_id: Uuid, note_id: Uuid) -> Result<(), TicketError> {
    let note = load_note(pool, principal, ticket_id, note_id).await?;
    if note.author_id != principal.id {
        return Err(TicketError::NotAuthor(note_id));
    }
    sqlx::query("DELETE FROM ticket_notes WHERE id = $1")
        .bind(note_id)
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// SUBTASKS
// =============================================================================

/// Partial update of a checklist item. Absent fields are left alone.
///
/// # Errors
///
/// Returns `Invalid`, `SubtaskNotFound`, or a database error.
pub async fn update_subtask(
    pool: &PgPool,
    principal: &Principal,
    ticket_id: Uuid,
    subtask_id: Uuid,
    title: Option<&str>,
    completed: Option<bool>,
) -> Result<SubtaskRow, TicketError> {
    let title = match title.map(str::trim) {
        Some("") => return Err(TicketError::Invalid("title must not be empty")),
        other => other,
    };

    sqlx::query_as::<_, SubtaskTuple>(
        "UPDATE ticket_subtasks s
         SET title = COALESCE($4, s.title),
             completed = COALESCE($5, s.completed),
             updated_at = now()
         FROM tickets t
         WHERE s.id = $1 AND s.ticket_id = $2 AND t.id = s.ticket_id AND t.tenant_id = $3
         RETURNING s.id, s.ticket_id, s.title, s.completed, s.position, s.updated_at",
    )
    .bind(subtask_id)
    .bind(ticket_id)
    .bind(principal.tenant_id)
    .bind(title)
    .bind(completed)
    .fetch_optional(pool)
    .await?
    .map(subtask_from)
    .ok_or(TicketError::SubtaskNotFound(subtask_id))
}

/// Delete a checklist item.
///
/// # Errors
///
/// Returns `SubtaskNotFound` or a database error.
pub async fn delete_subtask(
    pool: &PgPool,
    principal: &Principal,
    ticket_id: Uuid,
    subtask_id: Uuid,
) -> Result<(), TicketError> {
    let result = sqlx::query(
        "DELETE FROM ticket_subtasks s
         USING tickets t
         WHERE s.id = $1 AND s.ticket_id = $2 AND t.id = s.ticket_id AND t.tenant_id = $3",
    )
    .bind(subtask_id)
    .bind(ticket_id)
    .bind(principal.tenant_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(TicketError::SubtaskNotFound(subtask_id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "ticket_test.rs"]
mod tests;
