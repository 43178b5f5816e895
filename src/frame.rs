//! Frame: the wire envelope for every gateway message.
//!
//! ARCHITECTURE
//! ============
//! Clients send request frames (`event` + flat `data`) over the socket. The
//! coordinator answers each request with exactly one reply frame whose
//! `parent_id` points back at the request and whose `data` is the result
//! object (`{success, ...}`). Server pushes (`user_joined`, `note_created`,
//! ...) are frames without a parent.
//!
//! DESIGN
//! ======
//! - Flat data: the top level of `data` is always a key-value map.
//! - Domain payloads handed in by REST handlers (notes, messages, reactions)
//!   are opaque and ride verbatim under a single key.
//! - Routing happens on `event`; the socket loop never inspects `data`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// EVENT NAMES
// =============================================================================

// Inbound (client → server).
pub const JOIN_ROOM: &str = "join_room";
pub const LEAVE_ROOM: &str = "leave_room";
pub const TYPING_START: &str = "typing_start";
pub const TYPING_STOP: &str = "typing_stop";
pub const PRESENCE_UPDATE: &str = "presence_update";

// Outbound (server → client).
pub const CONNECTED: &str = "connected";
pub const ERROR: &str = "error";
pub const USER_JOINED: &str = "user_joined";
pub const USER_LEFT: &str = "user_left";
pub const PRESENCE_CHANGED: &str = "presence_changed";
pub const TYPING_INDICATOR: &str = "typing_indicator";
pub const NOTE_CREATED: &str = "note_created";
pub const NOTE_UPDATED: &str = "note_updated";
pub const NOTE_DELETED: &str = "note_deleted";
pub const CHECKLIST_UPDATED: &str = "checklist_updated";
pub const SUBTASK_DELETED: &str = "subtask_deleted";
pub const MESSAGE_CREATED: &str = "message_created";
pub const MESSAGE_DELETED: &str = "message_deleted";
pub const REACTION_ADDED: &str = "reaction_added";
pub const REACTION_REMOVED: &str = "reaction_removed";
pub const MENTION_NOTIFY: &str = "mention_notify";

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Result flag on every reply.
pub const FRAME_SUCCESS: &str = "success";

/// Human-readable failure reason on failed replies.
pub const FRAME_ERROR: &str = "error";

/// Grepable failure code on failed replies.
pub const FRAME_CODE: &str = "code";

/// Whether the client may retry the same request later.
pub const FRAME_RETRYABLE: &str = "retryable";

/// Error event text.
pub const FRAME_MESSAGE: &str = "message";

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// The universal message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Milliseconds since Unix epoch. Set automatically at construction.
    #[serde(default = "now_ms")]
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub event: String,
    #[serde(default)]
    pub data: Data,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured failure replies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Create a request frame, as a client would send it.
    pub fn request(event: impl Into<String>, data: Data) -> Self {
        Self { id: Uuid::new_v4(), parent_id: None, ts: now_ms(), room: None, event: event.into(), data }
    }

    /// Create a server push. Same shape as a request; the name says who sent it.
    pub fn push(event: impl Into<String>, data: Data) -> Self {
        Self::request(event, data)
    }

    /// `error` push with a plain message.
    #[must_use]
    pub fn error_event(message: impl Into<String>) -> Self {
        Self::push(ERROR, Data::new()).with_data(FRAME_MESSAGE, message.into())
    }

    /// Successful reply carrying extra result fields.
    #[must_use]
    pub fn ok_with(&self, mut data: Data) -> Self {
        data.insert(FRAME_SUCCESS.into(), serde_json::Value::Bool(true));
        self.reply(data)
    }

    /// Failed reply from a typed error: `{success:false, error, code, retryable}`.
    #[must_use]
    pub fn failure(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_SUCCESS.into(), serde_json::Value::Bool(false));
        data.insert(FRAME_ERROR.into(), serde_json::Value::String(err.to_string()));
        data.insert(FRAME_CODE.into(), serde_json::Value::String(err.error_code().to_string()));
        data.insert(FRAME_RETRYABLE.into(), serde_json::Value::Bool(err.retryable()));
        self.reply(data)
    }

    /// Build a reply frame. Inherits `room` and `event`, points back via `parent_id`.
    fn reply(&self, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: now_ms(),
            room: self.room.clone(),
            event: self.event.clone(),
            data,
        }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// ACCESSORS
// =============================================================================

impl Frame {
    /// String field from `data`, if present and a string.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Target room of a request: the `room` data field, falling back to the
    /// envelope `room`.
    #[must_use]
    pub fn target_room(&self) -> Option<&str> {
        self.data_str("room").or(self.room.as_deref())
    }

    /// `success` flag of a reply. `None` for pushes and requests.
    #[cfg(test)]
    #[must_use]
    pub fn success(&self) -> Option<bool> {
        self.data.get(FRAME_SUCCESS).and_then(serde_json::Value::as_bool)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
