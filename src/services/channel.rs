//! Team channel service: chat messages.
//!
//! Posting requires channel participation; deleting requires authorship.
//! Channels outside the caller's tenant do not exist as far as the caller
//! can tell.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::principal::Principal;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel not found: {0}")]
    ChannelNotFound(Uuid),
    #[error("message not found: {0}")]
    MessageNotFound(Uuid),
    #[error("not a participant of channel {0}")]
    NotParticipant(Uuid),
    #[error("only the author may delete message {0}")]
    NotAuthor(Uuid),
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ChannelError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ChannelNotFound(_) => "E_CHANNEL_NOT_FOUND",
            Self::MessageNotFound(_) => "E_MESSAGE_NOT_FOUND",
            Self::NotParticipant(_) => "E_NOT_PARTICIPANT",
            Self::NotAuthor(_) => "E_NOT_AUTHOR",
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

type MessageTuple = (Uuid, Uuid, Uuid, String, DateTime<Utc>);

fn message_from((id, channel_id, author_id, body, created_at): MessageTuple) -> MessageRow {
    MessageRow { id, channel_id, author_id, body, created_at }
}

/// Fail unless the channel is in the principal's tenant and they take part.
///
/// # Errors
///
/// Returns `ChannelNotFound`, `NotParticipant`, or a database error.
pub async fn ensure_participant(pool: &PgPool, principal: &Principal, channel_id: Uuid) -> Result<(), ChannelError> {
    let row = sqlx::query_as::<_, (bool,)>(
        "SELECT EXISTS(
            SELECT 1 FROM channel_participants p
            WHERE p.channel_id = c.id AND p.user_id = $3
         )
         FROM team_channels c
         WHERE c.id = $1 AND c.tenant_id = $2",
    )
    .bind(channel_id)
    .bind(principal.tenant_id)
    .bind(principal.id)
    .fetch_optional(pool)
    .await?;

    match row {
        None => Err(ChannelError::ChannelNotFound(channel_id)),
        Some((false,)) => Err(ChannelError::NotParticipant(channel_id)),
        Some((true,)) => Ok(()),
    }
}

/// The subset of `user_ids` taking part in `channel_id`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn participants_among(pool: &PgPool, channel_id: Uuid, user_ids: &[Uuid]) -> Result<Vec<Uuid>, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_scalar(
        "SELECT user_id FROM channel_participants
         WHERE channel_id = $1 AND user_id = ANY($2)",
    )
    .bind(channel_id)
    .bind(user_ids)
    .fetch_all(pool)
    .await
}

/// Post a message to a channel.
///
/// # Errors
///
/// Returns `Invalid`, `ChannelNotFound`, `NotParticipant`, or a database
/// error.
pub async fn post_message(
    pool: &PgPool,
    principal: &Principal,
    channel_id: Uuid,
    body: &str,
) -> Result<MessageRow, ChannelError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ChannelError::Invalid("body must not be empty"));
    }
    ensure_participant(pool, principal, channel_id).await?;

    let row = sqlx::query_as::<_, MessageTuple>(
        "INSERT INTO channel_messages (id, channel_id, author_id, body)
         VALUES ($1, $2, $3, $4)
         RETURNING id, channel_id, author_id, body, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(channel_id)
    .bind(principal.id)
    .bind(body)
    .fetch_one(pool)
    .await?;
    Ok(message_from(row))
}

/// Delete a message. Author only.
///
/// # Errors
///
/// Returns `MessageNotFound`, `NotAuthor`, or a database error.
pub async fn delete_message(
    pool: &PgPool,
    principal: &Principal,
    channel_id: Uuid,
    message_id: Uuid,
) -> Result<(), ChannelError> {
    let author: Uuid = sqlx::query_scalar(
        "SELECT m.author_id
         FROM channel_messages m
         JOIN team_channels c ON c.id = m.channel_id
         WHERE m.id = $1 AND m.channel_id = $2 AND c.tenant_id = $3",
    )
    .bind(message_id)
    .bind(channel_id)
    .bind(principal.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ChannelError::MessageNotFound(message_id))?;

    if author != principal.id {
        return Err(ChannelError::NotAuthor(message_id));
    }
    sqlx::query("DELETE FROM channel_messages WHERE id = $1")
        .bind(message_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
