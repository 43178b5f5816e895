//! Room registry: live connections and room membership.
//!
//! DESIGN
//! ======
//! Membership of record is per CONNECTION: `room -> [connection_id]` in join
//! order, mirrored by `connection_id -> {rooms}` for teardown. Presence (which
//! principals are in a room) is derived from it, so a user with two open tabs
//! stays present until the last of them leaves.
//!
//! The registry is an owned value handed to the coordinator at construction.
//! Nothing here is global; tests build as many as they like.
//!
//! LOCKING
//! =======
//! One `RwLock` over both maps. Mutations take the write lock for the map
//! update only; broadcasts take the read lock and `try_send` into each
//! connection's bounded queue, so a slow client never blocks a room.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::frame::Frame;
use crate::room::RoomId;
use crate::services::principal::Principal;

/// Gateway-assigned connection identifier.
pub type ConnectionId = Uuid;

// =============================================================================
// OUTCOMES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// `false` when this connection was already in the room.
    pub newly_joined: bool,
    /// The principal had no connection in the room before this join.
    pub principal_arrived: bool,
    pub active_users: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The principal has no other connection left in the room.
    pub principal_departed: bool,
    pub active_users: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VacatedRoom {
    pub room: RoomId,
    pub principal_departed: bool,
    pub active_users: Vec<Uuid>,
}

/// Everything a disconnect retracted.
#[derive(Debug, Clone)]
pub struct Departure {
    pub principal: Arc<Principal>,
    pub rooms: Vec<VacatedRoom>,
}

// =============================================================================
// REGISTRY
// =============================================================================

struct ConnectionEntry {
    principal: Arc<Principal>,
    tx: mpsc::Sender<Frame>,
    rooms: HashSet<RoomId>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomId, Vec<ConnectionId>>,
}

impl RegistryInner {
    /// Distinct principals in `room`, in first-join order.
    fn active_users(&self, room: &RoomId) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.rooms
            .get(room)
            .into_iter()
            .flatten()
            .filter_map(|conn| self.connections.get(conn))
            .map(|entry| entry.principal.id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    fn principal_present(&self, room: &RoomId, principal_id: Uuid) -> bool {
        self.rooms.get(room).is_some_and(|members| {
            members.iter().any(|conn| {
                self.connections
                    .get(conn)
                    .is_some_and(|entry| entry.principal.id == principal_id)
            })
        })
    }

    fn detach(&mut self, room: &RoomId, connection_id: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.retain(|conn| *conn != connection_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly authenticated connection. It starts in no rooms.
    pub async fn register(&self, connection_id: ConnectionId, principal: Principal, tx: mpsc::Sender<Frame>) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(
            connection_id,
            ConnectionEntry { principal: Arc::new(principal), tx, rooms: HashSet::new() },
        );
    }

    pub async fn principal(&self, connection_id: ConnectionId) -> Option<Arc<Principal>> {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&connection_id)
            .map(|entry| Arc::clone(&entry.principal))
    }

    pub async fn is_member(&self, connection_id: ConnectionId, room: &RoomId) -> bool {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&connection_id)
            .is_some_and(|entry| entry.rooms.contains(room))
    }

    /// Add a connection to a room. `None` if the connection is not registered.
    pub async fn join(&self, connection_id: ConnectionId, room: &RoomId) -> Option<JoinOutcome> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let principal_id = inner.connections.get(&connection_id)?.principal.id;
        let was_present = inner.principal_present(room, principal_id);
        let entry = inner.connections.get_mut(&connection_id)?;
        let newly_joined = entry.rooms.insert(room.clone());
        if newly_joined {
            inner.rooms.entry(room.clone()).or_default().push(connection_id);
        }
        Some(JoinOutcome {
            newly_joined,
            principal_arrived: newly_joined && !was_present,
            active_users: inner.active_users(room),
        })
    }

    /// Remove a connection from a room. `None` if it was not a member.
    pub async fn leave(&self, connection_id: ConnectionId, room: &RoomId) -> Option<LeaveOutcome> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let entry = inner.connections.get_mut(&connection_id)?;
        if !entry.rooms.remove(room) {
            return None;
        }
        let principal_id = entry.principal.id;
        inner.detach(room, connection_id);
        Some(LeaveOutcome {
            principal_departed: !inner.principal_present(room, principal_id),
            active_users: inner.active_users(room),
        })
    }

    /// Forget a connection and retract all of its memberships. Returns `None`
    /// on the second and later calls.
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<Departure> {
        let mut inner = self.inner.write().await;
        let entry = inner.connections.remove(&connection_id)?;
        let principal_id = entry.principal.id;

        let mut rooms = Vec::with_capacity(entry.rooms.len());
        for room in entry.rooms {
            inner.detach(&room, connection_id);
            let principal_departed = !inner.principal_present(&room, principal_id);
            let active_users = inner.active_users(&room);
            rooms.push(VacatedRoom { room, principal_departed, active_users });
        }
        Some(Departure { principal: entry.principal, rooms })
    }

    pub async fn active_users(&self, room: &RoomId) -> Vec<Uuid> {
        self.inner.read().await.active_users(room)
    }

    /// Rooms a connection is in. Empty for unknown connections.
    #[cfg(test)]
    pub async fn rooms_of(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&connection_id)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Queue `frame` for every member of `room` except `exclude`. Best effort:
    /// a full or closed queue drops the frame for that member. Returns how
    /// many connections it was dispatched to.
    pub async fn broadcast(&self, room: &RoomId, frame: &Frame, exclude: Option<ConnectionId>) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return 0;
        };

        let mut dispatched = 0;
        for conn in members {
            if exclude == Some(*conn) {
                continue;
            }
            let Some(entry) = inner.connections.get(conn) else {
                continue;
            };
            if entry.tx.try_send(frame.clone()).is_ok() {
                dispatched += 1;
            } else {
                tracing::debug!(connection_id = %conn, %room, event = %frame.event, "dropped frame for slow or closed connection");
            }
        }
        dispatched
    }

    /// Queue `frame` for one connection. Best effort, like `broadcast`.
    pub async fn send_to(&self, connection_id: ConnectionId, frame: Frame) -> bool {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&connection_id)
            .is_some_and(|entry| entry.tx.try_send(frame).is_ok())
    }

    #[cfg(test)]
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    #[cfg(test)]
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
