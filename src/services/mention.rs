//! Mention fan-out for notes and channel messages.
//!
//! Requested ids are deduplicated in order and the author is dropped. Only
//! active users of the author's tenant are notified, and a mention raised in
//! a team channel reaches channel participants only. Delivery goes to the
//! personal room of each recipient, so every open tab gets it.

use std::collections::HashSet;

use serde_json::json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::coordinator::Coordinator;
use crate::room::{RoomId, RoomKind};
use crate::services::channel::participants_among;
use crate::services::principal::{Principal, filter_tenant_members};

/// Characters of the source text carried in a notification.
pub const EXCERPT_CHARS: usize = 140;

/// Deduplicated mention targets, author excluded, first occurrence wins.
#[must_use]
pub fn mention_candidates(author_id: Uuid, requested: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .copied()
        .filter(|id| *id != author_id && seen.insert(*id))
        .collect()
}

/// First [`EXCERPT_CHARS`] characters of `body`, with an ellipsis if cut.
#[must_use]
pub fn excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() { format!("{head}…") } else { head }
}

/// Who may read the text a mention quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionScope {
    /// Any active user of the tenant.
    Tenant,
    /// Active tenant users who take part in the channel.
    Channel(Uuid),
    /// The source room refers to nothing; nobody is notified.
    Closed,
}

impl MentionScope {
    #[must_use]
    pub fn for_room(room: &RoomId) -> Self {
        match room.kind() {
            RoomKind::Team => room.entity_id().map_or(Self::Closed, Self::Channel),
            RoomKind::User | RoomKind::Ticket => Self::Tenant,
        }
    }
}

/// Keep the ids of `members` that appear in `participants`, in order.
#[must_use]
pub fn retain_participants(members: Vec<Uuid>, participants: &[Uuid]) -> Vec<Uuid> {
    let participants: HashSet<&Uuid> = participants.iter().collect();
    members.into_iter().filter(|id| participants.contains(id)).collect()
}

/// Candidates allowed to receive a mention from `scope`.
///
/// # Errors
///
/// Returns a database error if a filter query fails.
pub async fn filter_recipients(
    pool: &PgPool,
    tenant_id: Uuid,
    scope: MentionScope,
    candidates: &[Uuid],
) -> Result<Vec<Uuid>, sqlx::Error> {
    if candidates.is_empty() || scope == MentionScope::Closed {
        return Ok(Vec::new());
    }
    let members = filter_tenant_members(pool, tenant_id, candidates).await?;
    match scope {
        MentionScope::Channel(channel_id) => {
            let participants = participants_among(pool, channel_id, &members).await?;
            Ok(retain_participants(members, &participants))
        }
        MentionScope::Tenant | MentionScope::Closed => Ok(members),
    }
}

/// Notify every valid mention of `author`. `room` is where the mention
/// happened. Returns the number of users notified.
///
/// # Errors
///
/// Returns a database error if a recipient filter query fails.
pub async fn notify_mentions(
    pool: &PgPool,
    coordinator: &Coordinator,
    author: &Principal,
    requested: &[Uuid],
    room: &RoomId,
    source_id: Uuid,
    body: &str,
) -> Result<usize, sqlx::Error> {
    let candidates = mention_candidates(author.id, requested);
    if candidates.is_empty() {
        return Ok(0);
    }
    let scope = MentionScope::for_room(room);
    let recipients = filter_recipients(pool, author.tenant_id, scope, &candidates).await?;

    let notification = json!({
        "room": room.to_string(),
        "sourceId": source_id,
        "authorId": author.id,
        "authorName": author.name,
        "excerpt": excerpt(body),
    });
    for user_id in &recipients {
        let delivered = coordinator.notify_mention(*user_id, notification.clone()).await;
        debug!(%user_id, %room, delivered, "mention sent");
    }
    Ok(recipients.len())
}

#[cfg(test)]
#[path = "mention_test.rs"]
mod tests;
