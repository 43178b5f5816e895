//! Access-control oracle: may this principal join this room?
//!
//! RULES
//! =====
//! - `user:<id>`   only the principal's own personal room.
//! - `ticket:<id>` the ticket exists under the principal's tenant.
//! - `team:<id>`   the channel exists under the tenant AND the principal is a
//!   participant.
//!
//! Ids that are not UUIDs cannot name a stored entity and are denied without
//! touching the database.

use sqlx::PgPool;

use crate::room::{RoomId, RoomKind};
use crate::services::principal::Principal;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Narrow authorization seam used by the coordinator and the REST layer.
#[async_trait::async_trait]
pub trait AccessOracle: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`AccessError`] if the lookup itself fails. Callers treat
    /// that as a denial.
    async fn can_access(&self, principal: &Principal, room: &RoomId) -> Result<bool, AccessError>;
}

/// The personal-room rule, shared by every oracle implementation.
#[must_use]
pub fn owns_personal_room(principal: &Principal, room: &RoomId) -> bool {
    room.kind() == RoomKind::User && room.entity_id() == Some(principal.id)
}

pub struct PgAccessOracle {
    pool: PgPool,
}

impl PgAccessOracle {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AccessOracle for PgAccessOracle {
    async fn can_access(&self, principal: &Principal, room: &RoomId) -> Result<bool, AccessError> {
        match room.kind() {
            RoomKind::User => Ok(owns_personal_room(principal, room)),
            RoomKind::Ticket => {
                let Some(ticket_id) = room.entity_id() else {
                    return Ok(false);
                };
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tickets WHERE id = $1 AND tenant_id = $2)")
                        .bind(ticket_id)
                        .bind(principal.tenant_id)
                        .fetch_one(&self.pool)
                        .await?;
                Ok(exists)
            }
            RoomKind::Team => {
                let Some(channel_id) = room.entity_id() else {
                    return Ok(false);
                };
                let allowed: bool = sqlx::query_scalar(
                    "SELECT EXISTS(
                        SELECT 1
                        FROM team_channels c
                        JOIN channel_participants p ON p.channel_id = c.id
                        WHERE c.id = $1 AND c.tenant_id = $2 AND p.user_id = $3
                    )",
                )
                .bind(channel_id)
                .bind(principal.tenant_id)
                .bind(principal.id)
                .fetch_one(&self.pool)
                .await?;
                Ok(allowed)
            }
        }
    }
}

#[cfg(test)]
#[path = "access_test.rs"]
mod tests;
