use super::*;
use crate::frame::Data;
use crate::state::test_helpers::principal_in;

fn channel() -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    mpsc::channel(8)
}

async fn connect(registry: &RoomRegistry, principal: &Principal) -> (ConnectionId, mpsc::Receiver<Frame>) {
    let id = Uuid::new_v4();
    let (tx, rx) = channel();
    registry.register(id, principal.clone(), tx).await;
    (id, rx)
}

fn ticket_room() -> RoomId {
    RoomId::ticket(Uuid::new_v4())
}

#[tokio::test]
async fn register_starts_with_no_rooms() {
    let registry = RoomRegistry::new();
    let alice = principal_in(Uuid::new_v4());
    let (conn, _rx) = connect(&registry, &alice).await;

    assert_eq!(registry.connection_count().await, 1);
    assert!(registry.rooms_of(conn).await.is_empty());
    assert_eq!(registry.principal(conn).await.map(|p| p.id), Some(alice.id));
}

#[tokio::test]
async fn join_unknown_connection_creates_nothing() {
    let registry = RoomRegistry::new();
    let room = ticket_room();

    assert!(registry.join(Uuid::new_v4(), &room).await.is_none());
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn join_lists_principals_in_join_order() {
    let registry = RoomRegistry::new();
    let tenant = Uuid::new_v4();
    let alice = principal_in(tenant);
    let bob = principal_in(tenant);
    let (a, _ra) = connect(&registry, &alice).await;
    let (b, _rb) = connect(&registry, &bob).await;
    let room = ticket_room();

    let first = registry.join(a, &room).await.unwrap();
    assert!(first.newly_joined);
    assert_eq!(first.active_users, vec![alice.id]);

    let second = registry.join(b, &room).await.unwrap();
    assert_eq!(second.active_users, vec![alice.id, bob.id]);
}

#[tokio::test]
async fn rejoin_is_idempotent() {
    let registry = RoomRegistry::new();
    let alice = principal_in(Uuid::new_v4());
    let (a, _ra) = connect(&registry, &alice).await;
    let room = ticket_room();

    registry.join(a, &room).await.unwrap();
    let again = registry.join(a, &room).await.unwrap();

    assert!(!again.newly_joined);
    assert_eq!(again.active_users, vec![alice.id]);
    assert_eq!(registry.rooms_of(a).await, vec![room]);
}

#[tokio::test]
async fn two_connections_of_one_user_count_once() {
    let registry = RoomRegistry::new();
    let alice = principal_in(Uuid::new_v4());
    let (laptop, _r1) = connect(&registry, &alice).await;
    let (phone, _r2) = connect(&registry, &alice).await;
    let room = ticket_room();

    let first = registry.join(laptop, &room).await.unwrap();
    assert!(first.principal_arrived);
    let outcome = registry.join(phone, &room).await.unwrap();
    assert!(outcome.newly_joined);
    assert!(!outcome.principal_arrived);
    assert_eq!(outcome.active_users, vec![alice.id]);
}

#[tokio::test]
async fn closing_one_of_two_connections_keeps_presence() {
    let registry = RoomRegistry::new();
    let alice = principal_in(Uuid::new_v4());
    let (laptop, _r1) = connect(&registry, &alice).await;
    let (phone, _r2) = connect(&registry, &alice).await;
    let room = ticket_room();
    registry.join(laptop, &room).await.unwrap();
    registry.join(phone, &room).await.unwrap();

    let departure = registry.unregister(laptop).await.unwrap();
    assert_eq!(departure.rooms.len(), 1);
    assert!(!departure.rooms[0].principal_departed);
    assert_eq!(departure.rooms[0].active_users, vec![alice.id]);
    assert_eq!(registry.active_users(&room).await, vec![alice.id]);

    let departure = registry.unregister(phone).await.unwrap();
    assert!(departure.rooms[0].principal_departed);
    assert!(departure.rooms[0].active_users.is_empty());
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn leave_requires_membership() {
    let registry = RoomRegistry::new();
    let alice = principal_in(Uuid::new_v4());
    let (a, _ra) = connect(&registry, &alice).await;
    let room = ticket_room();

    assert!(registry.leave(a, &room).await.is_none());

    registry.join(a, &room).await.unwrap();
    let outcome = registry.leave(a, &room).await.unwrap();
    assert!(outcome.principal_departed);
    assert!(outcome.active_users.is_empty());
    assert!(!registry.is_member(a, &room).await);
}

#[tokio::test]
async fn unregister_is_idempotent() {
    let registry = RoomRegistry::new();
    let alice = principal_in(Uuid::new_v4());
    let (a, _ra) = connect(&registry, &alice).await;
    registry.join(a, &ticket_room()).await.unwrap();
    registry.join(a, &RoomId::user(alice.id)).await.unwrap();

    let departure = registry.unregister(a).await.unwrap();
    assert_eq!(departure.principal.id, alice.id);
    assert_eq!(departure.rooms.len(), 2);

    assert!(registry.unregister(a).await.is_none());
    assert_eq!(registry.connection_count().await, 0);
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn broadcast_reaches_members_except_excluded() {
    let registry = RoomRegistry::new();
    let tenant = Uuid::new_v4();
    let (a, mut ra) = connect(&registry, &principal_in(tenant)).await;
    let (b, mut rb) = connect(&registry, &principal_in(tenant)).await;
    let (_c, mut rc) = connect(&registry, &principal_in(tenant)).await;
    let room = ticket_room();
    registry.join(a, &room).await.unwrap();
    registry.join(b, &room).await.unwrap();

    let frame = Frame::push("note_created", Data::new());
    assert_eq!(registry.broadcast(&room, &frame, Some(a)).await, 1);

    assert_eq!(rb.try_recv().unwrap().id, frame.id);
    assert!(ra.try_recv().is_err());
    assert!(rc.try_recv().is_err());
}

#[tokio::test]
async fn broadcast_to_empty_room_is_dropped() {
    let registry = RoomRegistry::new();
    let frame = Frame::push("note_created", Data::new());
    assert_eq!(registry.broadcast(&ticket_room(), &frame, None).await, 0);
}

#[tokio::test]
async fn full_queue_drops_frame_for_that_member_only() {
    let registry = RoomRegistry::new();
    let tenant = Uuid::new_v4();
    let slow = Uuid::new_v4();
    let (slow_tx, _slow_rx) = mpsc::channel(1);
    registry.register(slow, principal_in(tenant), slow_tx).await;
    let (fast, mut fast_rx) = connect(&registry, &principal_in(tenant)).await;
    let room = ticket_room();
    registry.join(slow, &room).await.unwrap();
    registry.join(fast, &room).await.unwrap();

    let frame = Frame::push("message_created", Data::new());
    assert_eq!(registry.broadcast(&room, &frame, None).await, 2);
    // Slow queue is now full.
    assert_eq!(registry.broadcast(&room, &frame, None).await, 1);

    assert!(fast_rx.try_recv().is_ok());
    assert!(fast_rx.try_recv().is_ok());
}

#[tokio::test]
async fn send_to_targets_one_connection() {
    let registry = RoomRegistry::new();
    let (a, mut ra) = connect(&registry, &principal_in(Uuid::new_v4())).await;

    assert!(registry.send_to(a, Frame::push("connected", Data::new())).await);
    assert_eq!(ra.try_recv().unwrap().event, "connected");
    assert!(!registry.send_to(Uuid::new_v4(), Frame::push("connected", Data::new())).await);
}
