//! Room identifiers: `<kind>:<id>` routing keys.
//!
//! Rooms are never persisted. A well-formed identifier splits on the FIRST
//! `:` into a known kind and a non-empty id; everything else is rejected
//! before any authorization lookup happens.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomIdError {
    #[error("malformed room id: {0:?}")]
    Malformed(String),
    #[error("unknown room kind: {0:?}")]
    UnknownKind(String),
}

impl crate::frame::ErrorCode for RoomIdError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_ROOM_MALFORMED",
            Self::UnknownKind(_) => "E_ROOM_UNKNOWN_KIND",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    /// Personal room, one per principal.
    User,
    /// Everyone looking at a ticket.
    Ticket,
    /// Team chat channel.
    Team,
}

impl RoomKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ticket => "ticket",
            Self::Team => "team",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "ticket" => Some(Self::Ticket),
            "team" => Some(Self::Team),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId {
    kind: RoomKind,
    id: String,
}

impl RoomId {
    #[must_use]
    pub fn user(user_id: Uuid) -> Self {
        Self { kind: RoomKind::User, id: user_id.to_string() }
    }

    #[must_use]
    pub fn ticket(ticket_id: Uuid) -> Self {
        Self { kind: RoomKind::Ticket, id: ticket_id.to_string() }
    }

    #[must_use]
    pub fn team(channel_id: Uuid) -> Self {
        Self { kind: RoomKind::Team, id: channel_id.to_string() }
    }

    #[must_use]
    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    /// The part after the first `:`, untouched.
    #[cfg(test)]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The id as a UUID. Every persisted entity is UUID-keyed, so a room
    /// whose id does not parse cannot refer to anything.
    #[must_use]
    pub fn entity_id(&self) -> Option<Uuid> {
        self.id.parse().ok()
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let Some((kind, id)) = raw.split_once(':') else {
            return Err(RoomIdError::Malformed(raw.to_owned()));
        };
        if kind.is_empty() || id.is_empty() {
            return Err(RoomIdError::Malformed(raw.to_owned()));
        }
        let Some(kind) = RoomKind::parse(kind) else {
            return Err(RoomIdError::UnknownKind(kind.to_owned()));
        };
        Ok(Self { kind, id: id.to_owned() })
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
