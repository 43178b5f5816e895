use super::*;
use crate::state::test_helpers::{TestGateway, principal_in, test_pool};

#[test]
fn candidates_drop_author_and_duplicates() {
    let author = Uuid::new_v4();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    assert_eq!(mention_candidates(author, &[a, author, b, a, b]), vec![a, b]);
    assert!(mention_candidates(author, &[author, author]).is_empty());
    assert!(mention_candidates(author, &[]).is_empty());
}

#[test]
fn excerpt_keeps_short_text() {
    assert_eq!(excerpt("hello"), "hello");
    let exact = "a".repeat(EXCERPT_CHARS);
    assert_eq!(excerpt(&exact), exact);
}

#[test]
fn excerpt_cuts_on_char_boundary() {
    let long = "é".repeat(EXCERPT_CHARS + 5);
    let cut = excerpt(&long);
    assert!(cut.ends_with('…'));
    assert_eq!(cut.chars().count(), EXCERPT_CHARS + 1);
}

#[tokio::test]
async fn self_mention_sends_nothing_and_skips_database() {
    let gw = TestGateway::new();
    let alice = principal_in(Uuid::new_v4());
    let room = RoomId::ticket(Uuid::new_v4());

    let sent = notify_mentions(&test_pool(), &gw.coordinator, &alice, &[alice.id], &room, Uuid::new_v4(), "hi")
        .await
        .unwrap();
    assert_eq!(sent, 0);
}

#[test]
fn team_rooms_restrict_mentions_to_the_channel() {
    let channel = Uuid::new_v4();
    assert_eq!(MentionScope::for_room(&RoomId::team(channel)), MentionScope::Channel(channel));
    assert_eq!(MentionScope::for_room(&RoomId::ticket(Uuid::new_v4())), MentionScope::Tenant);
    assert_eq!(MentionScope::for_room(&RoomId::user(Uuid::new_v4())), MentionScope::Tenant);
    assert_eq!(MentionScope::for_room(&"team:general".parse().unwrap()), MentionScope::Closed);
}

#[test]
fn non_participant_mention_is_dropped() {
    let participant = Uuid::new_v4();
    let outsider = Uuid::new_v4();
    let late = Uuid::new_v4();

    let kept = retain_participants(vec![outsider, late, participant], &[participant, late]);
    assert_eq!(kept, vec![late, participant]);
    assert!(retain_participants(vec![outsider], &[]).is_empty());
}

#[tokio::test]
async fn closed_scope_notifies_nobody_without_querying() {
    let gw = TestGateway::new();
    let alice = principal_in(Uuid::new_v4());
    let bob = principal_in(alice.tenant_id);
    let (_bob_conn, mut bob_rx) = gw.connect(&bob).await;
    let room: RoomId = "team:not-a-uuid".parse().unwrap();

    let sent = notify_mentions(&test_pool(), &gw.coordinator, &alice, &[bob.id], &room, Uuid::new_v4(), "psst")
        .await
        .unwrap();
    assert_eq!(sent, 0);
    assert!(bob_rx.try_recv().is_err());
}
