//! Server-initiated broadcasts, called by REST handlers after a write.
//!
//! Fire-and-forget: each call returns how many connections the event was
//! queued for. Zero means the room was empty and the event was dropped.
//! Payloads are opaque JSON and are re-sent unchanged.

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::Coordinator;
use crate::frame::{self, Data, Frame};
use crate::room::RoomId;

impl Coordinator {
    pub async fn broadcast_note_created(&self, ticket_id: Uuid, note: Value) -> usize {
        let data = payload([("ticketId", ticket_id.to_string().into()), ("note", note)]);
        self.emit_to_room(&RoomId::ticket(ticket_id), frame::NOTE_CREATED, data)
            .await
    }

    pub async fn broadcast_note_updated(&self, ticket_id: Uuid, note: Value) -> usize {
        let data = payload([("ticketId", ticket_id.to_string().into()), ("note", note)]);
        self.emit_to_room(&RoomId::ticket(ticket_id), frame::NOTE_UPDATED, data)
            .await
    }

    pub async fn broadcast_note_deleted(&self, ticket_id: Uuid, note_id: Uuid) -> usize {
        let data = payload([
            ("ticketId", ticket_id.to_string().into()),
            ("noteId", note_id.to_string().into()),
        ]);
        self.emit_to_room(&RoomId::ticket(ticket_id), frame::NOTE_DELETED, data)
            .await
    }

    pub async fn broadcast_reaction_added(&self, room: &RoomId, reaction: Value) -> usize {
        self.emit_to_room(room, frame::REACTION_ADDED, payload([("reaction", reaction)]))
            .await
    }

    pub async fn broadcast_reaction_removed(&self, room: &RoomId, reaction_id: Uuid, target_id: Uuid) -> usize {
        let data = payload([
            ("reactionId", reaction_id.to_string().into()),
            ("targetId", target_id.to_string().into()),
        ]);
        self.emit_to_room(room, frame::REACTION_REMOVED, data).await
    }

    pub async fn broadcast_checklist_updated(&self, ticket_id: Uuid, subtask: Value) -> usize {
        let data = payload([("ticketId", ticket_id.to_string().into()), ("subtask", subtask)]);
        self.emit_to_room(&RoomId::ticket(ticket_id), frame::CHECKLIST_UPDATED, data)
            .await
    }

    pub async fn broadcast_message_created(&self, channel_id: Uuid, message: Value) -> usize {
        let data = payload([("channelId", channel_id.to_string().into()), ("message", message)]);
        self.emit_to_room(&RoomId::team(channel_id), frame::MESSAGE_CREATED, data)
            .await
    }

    /// Deliver a mention to every open connection of `user_id`.
    pub async fn notify_mention(&self, user_id: Uuid, notification: Value) -> usize {
        self.emit_to_room(
            &RoomId::user(user_id),
            frame::MENTION_NOTIFY,
            payload([("notification", notification)]),
        )
        .await
    }

    /// Raw escape hatch: push `event` with `data` to every member of `room`.
    pub async fn emit_to_room(&self, room: &RoomId, event: &str, data: Data) -> usize {
        let push = Frame::push(event, data).with_room(room.to_string());
        let dispatched = self.registry.broadcast(room, &push, None).await;
        debug!(%room, %event, dispatched, "gateway: server broadcast");
        dispatched
    }
}

fn payload<const N: usize>(fields: [(&str, Value); N]) -> Data {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}
