//! Reaction service: emoji on notes and channel messages.
//!
//! A reaction's room is derived from its target: note reactions go to the
//! ticket room, message reactions to the team room. Message reactions are
//! limited to channel participants.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::room::RoomId;
use crate::services::principal::Principal;

/// Longest accepted emoji string, in characters. Covers ZWJ sequences and
/// `:shortcode:` forms.
pub const MAX_EMOJI_CHARS: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ReactionError {
    #[error("reaction target not found: {0}")]
    TargetNotFound(Uuid),
    #[error("reaction not found: {0}")]
    NotFound(Uuid),
    #[error("only the author may remove reaction {0}")]
    NotAuthor(Uuid),
    #[error("reaction already exists")]
    Duplicate,
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ReactionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TargetNotFound(_) => "E_TARGET_NOT_FOUND",
            Self::NotFound(_) => "E_REACTION_NOT_FOUND",
            Self::NotAuthor(_) => "E_NOT_AUTHOR",
            Self::Duplicate => "E_DUPLICATE",
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionTarget {
    Note,
    Message,
}

impl ReactionTarget {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Message => "message",
        }
    }
}

impl FromStr for ReactionTarget {
    type Err = ReactionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "note" => Ok(Self::Note),
            "message" => Ok(Self::Message),
            _ => Err(ReactionError::Invalid("unknown target type")),
        }
    }
}

impl fmt::Display for ReactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRow {
    pub id: Uuid,
    pub target_type: ReactionTarget,
    pub target_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

type ReactionTuple = (Uuid, String, Uuid, Uuid, String, DateTime<Utc>);

fn reaction_from((id, target_type, target_id, user_id, emoji, created_at): ReactionTuple) -> Result<ReactionRow, ReactionError> {
    Ok(ReactionRow { id, target_type: target_type.parse()?, target_id, user_id, emoji, created_at })
}

/// Trimmed emoji, non-empty and at most [`MAX_EMOJI_CHARS`] characters.
///
/// # Errors
///
/// Returns `Invalid` otherwise.
pub fn normalize_emoji(emoji: &str) -> Result<&str, ReactionError> {
    let emoji = emoji.trim();
    if emoji.is_empty() {
        return Err(ReactionError::Invalid("emoji must not be empty"));
    }
    if emoji.chars().count() > MAX_EMOJI_CHARS {
        return Err(ReactionError::Invalid("emoji too long"));
    }
    Ok(emoji)
}

/// Room that watches `target_id`, if the principal can see the target.
async fn target_room(
    pool: &PgPool,
    principal: &Principal,
    target: ReactionTarget,
    target_id: Uuid,
) -> Result<Option<RoomId>, sqlx::Error> {
    let room = match target {
        ReactionTarget::Note => sqlx::query_scalar::<_, Uuid>(
            "SELECT n.ticket_id
             FROM ticket_notes n
             JOIN tickets t ON t.id = n.ticket_id
             WHERE n.id = $1 AND t.tenant_id = $2",
        )
        .bind(target_id)
        .bind(principal.tenant_id)
        .fetch_optional(pool)
        .await?
        .map(RoomId::ticket),
        ReactionTarget::Message => sqlx::query_scalar::<_, Uuid>(
            "SELECT m.channel_id
             FROM channel_messages m
             JOIN team_channels c ON c.id = m.channel_id
             JOIN channel_participants p ON p.channel_id = c.id AND p.user_id = $3
             WHERE m.id = $1 AND c.tenant_id = $2",
        )
        .bind(target_id)
        .bind(principal.tenant_id)
        .bind(principal.id)
        .fetch_optional(pool)
        .await?
        .map(RoomId::team),
    };
    Ok(room)
}

/// Add a reaction. Returns the row and the room to announce it in.
///
/// # Errors
///
/// Returns `Invalid`, `TargetNotFound`, `Duplicate`, or a database error.
pub async fn add_reaction(
    pool: &PgPool,
    principal: &Principal,
    target: ReactionTarget,
    target_id: Uuid,
    emoji: &str,
) -> Result<(ReactionRow, RoomId), ReactionError> {
    let emoji = normalize_emoji(emoji)?;
    let room = target_room(pool, principal, target, target_id)
        .await?
        .ok_or(ReactionError::TargetNotFound(target_id))?;

    let row = sqlx::query_as::<_, ReactionTuple>(
        "INSERT INTO reactions (id, tenant_id, target_type, target_id, user_id, emoji)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (target_type, target_id, user_id, emoji) DO NOTHING
         RETURNING id, target_type, target_id, user_id, emoji, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(principal.tenant_id)
    .bind(target.as_str())
    .bind(target_id)
    .bind(principal.id)
    .bind(emoji)
    .fetch_optional(pool)
    .await?
    .ok_or(ReactionError::Duplicate)?;

    Ok((reaction_from(row)?, room))
}

/// Remove one of the principal's reactions. The room is `None` when the
/// target has been deleted meanwhile.
///
/// # Errors
///
/// Returns `NotFound`, `NotAuthor`, or a database error.
pub async fn remove_reaction(
    pool: &PgPool,
    principal: &Principal,
    reaction_id: Uuid,
) -> Result<(ReactionRow, Option<RoomId>), ReactionError> {
    let row = sqlx::query_as::<_, ReactionTuple>(
        "SELECT id, target_type, target_id, user_id, emoji, created_at
         FROM reactions
         WHERE id = $1 AND tenant_id = $2",
    )
    .bind(reaction_id)
    .bind(principal.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ReactionError::NotFound(reaction_id))?;
    let reaction = reaction_from(row)?;

    if reaction.user_id != principal.id {
        return Err(ReactionError::NotAuthor(reaction_id));
    }
    sqlx::query("DELETE FROM reactions WHERE id = $1")
        .bind(reaction_id)
        .execute(pool)
        .await?;

    let room = target_room(pool, principal, reaction.target_type, reaction.target_id).await?;
    Ok((reaction, room))
}

#[cfg(test)]
#[path = "reaction_test.rs"]
mod tests;
