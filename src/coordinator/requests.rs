//! Client-initiated room events: join, leave, typing, presence.

use tracing::{debug, warn};
use uuid::Uuid;

use super::{Coordinator, Denial, ids_json, timestamp};
use crate::frame::{self, Data, Frame};
use crate::registry::ConnectionId;
use crate::room::RoomId;
use crate::services::principal::Principal;

/// Result of a successful `join_room`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room: RoomId,
    pub active_users: Vec<Uuid>,
}

impl Joined {
    pub(crate) fn into_data(self) -> Data {
        let mut data = Data::new();
        data.insert("room".into(), self.room.to_string().into());
        data.insert("activeUsers".into(), ids_json(&self.active_users));
        data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
    Offline,
}

impl PresenceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "online" => Some(Self::Online),
            "away" => Some(Self::Away),
            "busy" => Some(Self::Busy),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

impl Coordinator {
    /// Authorize and add the connection to `room`.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated`, `RateLimited`, or `NotAuthorized` (malformed id,
    /// oracle denial, oracle failure).
    pub async fn join_room(&self, connection_id: ConnectionId, room: Option<&str>) -> Result<Joined, Denial> {
        let principal = self.principal_of(connection_id).await?;
        self.throttle(connection_id, frame::JOIN_ROOM)?;

        let room: RoomId = room
            .ok_or(Denial::NotAuthorized)?
            .parse()
            .map_err(|e| {
                debug!(%connection_id, error = %e, "gateway: malformed room id");
                Denial::NotAuthorized
            })?;

        let allowed = match self.oracle.can_access(&principal, &room).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(%connection_id, %room, error = %e, "gateway: access check failed");
                false
            }
        };
        if !allowed {
            return Err(Denial::NotAuthorized);
        }

        // The connection may have closed while the oracle was running.
        let outcome = self
            .registry
            .join(connection_id, &room)
            .await
            .ok_or(Denial::NotAuthenticated)?;

        if outcome.principal_arrived {
            let notice = Frame::push(frame::USER_JOINED, Data::new())
                .with_room(room.to_string())
                .with_data("room", room.to_string())
                .with_data("userId", principal.id.to_string())
                .with_data("user", principal.display())
                .with_data("activeUsers", ids_json(&outcome.active_users))
                .with_data("timestamp", timestamp());
            self.registry.broadcast(&room, &notice, None).await;
        }

        Ok(Joined { room, active_users: outcome.active_users })
    }

    /// Remove the connection from `room`. Unknown or never-joined rooms
    /// succeed silently.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` or `RateLimited`.
    pub async fn leave_room(&self, connection_id: ConnectionId, room: Option<&str>) -> Result<(), Denial> {
        let principal = self.principal_of(connection_id).await?;
        self.throttle(connection_id, frame::LEAVE_ROOM)?;

        let Some(room) = room.and_then(|raw| raw.parse::<RoomId>().ok()) else {
            return Ok(());
        };
        let Some(outcome) = self.registry.leave(connection_id, &room).await else {
            return Ok(());
        };

        if outcome.principal_departed {
            let notice = Frame::push(frame::USER_LEFT, Data::new())
                .with_room(room.to_string())
                .with_data("room", room.to_string())
                .with_data("userId", principal.id.to_string())
                .with_data("activeUsers", ids_json(&outcome.active_users))
                .with_data("timestamp", timestamp());
            self.registry.broadcast(&room, &notice, None).await;
        }
        Ok(())
    }

    /// Relay a typing indicator to the other members of `room`.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated`, `RateLimited`, or `NotMember`.
    pub async fn typing(&self, connection_id: ConnectionId, room: Option<&str>, is_typing: bool) -> Result<(), Denial> {
        let principal = self.principal_of(connection_id).await?;
        let event = if is_typing { frame::TYPING_START } else { frame::TYPING_STOP };
        self.throttle(connection_id, event)?;
        let room = self.member_room(connection_id, room).await?;

        let notice = Frame::push(frame::TYPING_INDICATOR, Data::new())
            .with_room(room.to_string())
            .with_data("room", room.to_string())
            .with_data("userId", principal.id.to_string())
            .with_data("user", principal.display_minimal())
            .with_data("isTyping", is_typing);
        self.registry
            .broadcast(&room, &notice, Some(connection_id))
            .await;
        Ok(())
    }

    /// Broadcast a presence status to the whole of `room`, sender included.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated`, `RateLimited`, `InvalidStatus`, or `NotMember`.
    pub async fn update_presence(
        &self,
        connection_id: ConnectionId,
        room: Option<&str>,
        status: Option<&str>,
    ) -> Result<(), Denial> {
        let principal = self.principal_of(connection_id).await?;
        self.throttle(connection_id, frame::PRESENCE_UPDATE)?;
        let status = status
            .and_then(PresenceStatus::parse)
            .ok_or(Denial::InvalidStatus)?;
        let room = self.member_room(connection_id, room).await?;

        let notice = Frame::push(frame::PRESENCE_CHANGED, Data::new())
            .with_room(room.to_string())
            .with_data("room", room.to_string())
            .with_data("userId", principal.id.to_string())
            .with_data("status", status.as_str())
            .with_data("timestamp", timestamp());
        self.registry.broadcast(&room, &notice, None).await;
        Ok(())
    }

    /// Active principals of `room`, if the oracle lets `principal` see it.
    ///
    /// # Errors
    ///
    /// `NotAuthorized` for malformed ids, denials and oracle failures.
    pub async fn room_presence(
        &self,
        principal: &Principal,
        room: &str,
    ) -> Result<(RoomId, Vec<Uuid>), Denial> {
        let room: RoomId = room.parse().map_err(|_| Denial::NotAuthorized)?;
        match self.oracle.can_access(principal, &room).await {
            Ok(true) => {}
            Ok(false) => return Err(Denial::NotAuthorized),
            Err(e) => {
                warn!(user_id = %principal.id, %room, error = %e, "gateway: access check failed");
                return Err(Denial::NotAuthorized);
            }
        }
        let active_users = self.registry.active_users(&room).await;
        Ok((room, active_users))
    }

    async fn member_room(&self, connection_id: ConnectionId, room: Option<&str>) -> Result<RoomId, Denial> {
        let room = room
            .and_then(|raw| raw.parse::<RoomId>().ok())
            .ok_or(Denial::NotMember)?;
        if self.registry.is_member(connection_id, &room).await {
            Ok(room)
        } else {
            Err(Denial::NotMember)
        }
    }
}
