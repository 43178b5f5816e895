use super::*;
use crate::state::test_helpers::{TestGateway, principal_in};

#[test]
fn channel_error_to_status_maps_each_variant() {
    assert_eq!(channel_error_to_status(ChannelError::ChannelNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(channel_error_to_status(ChannelError::MessageNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(channel_error_to_status(ChannelError::NotParticipant(Uuid::nil())), StatusCode::FORBIDDEN);
    assert_eq!(channel_error_to_status(ChannelError::NotAuthor(Uuid::nil())), StatusCode::FORBIDDEN);
    assert_eq!(channel_error_to_status(ChannelError::Invalid("x")), StatusCode::BAD_REQUEST);
    assert_eq!(
        channel_error_to_status(ChannelError::Database(sqlx::Error::PoolClosed)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn post_body_accepts_mentions() {
    let id = Uuid::new_v4();
    let body: PostMessageBody = serde_json::from_value(json!({ "body": "hey", "mentions": [id] })).unwrap();
    assert_eq!(body.mentions, vec![id]);
}

#[tokio::test]
async fn blank_message_is_bad_request() {
    let gw = TestGateway::new();
    let alice = principal_in(Uuid::new_v4());

    let body = PostMessageBody { body: String::new(), mentions: vec![] };
    let status = post_message(
        State(gw.app_state()),
        AuthUser { principal: alice },
        Path(Uuid::new_v4()),
        Json(body),
    )
    .await
    .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
