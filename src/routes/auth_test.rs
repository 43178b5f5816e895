use super::*;
use crate::services::identity::IdentityError;
use crate::services::principal::DirectoryError;
use crate::state::test_helpers::TestGateway;
use axum::extract::FromRequestParts;
use axum::http::Request;
use uuid::Uuid;

fn parts(authorization: Option<&str>) -> axum::http::request::Parts {
    let mut builder = Request::builder().uri("/api/reactions");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    builder.body(()).unwrap().into_parts().0
}

#[test]
fn token_failures_are_unauthorized() {
    assert_eq!(handshake_error_to_status(HandshakeError::MissingToken), StatusCode::UNAUTHORIZED);
    assert_eq!(
        handshake_error_to_status(HandshakeError::InvalidToken(IdentityError::Expired)),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        handshake_error_to_status(HandshakeError::PrincipalInactive(Uuid::nil())),
        StatusCode::UNAUTHORIZED
    );
}

#[test]
fn infrastructure_failures_are_server_errors() {
    let err = HandshakeError::Directory(DirectoryError::Database(sqlx::Error::PoolTimedOut));
    assert_eq!(handshake_error_to_status(err), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        handshake_error_to_status(HandshakeError::Timeout("principal lookup")),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn bearer_header_resolves_principal() {
    let gw = TestGateway::new();
    let (alice, token) = gw.enroll(Uuid::new_v4());
    let state = gw.app_state();

    let mut parts = parts(Some(&format!("Bearer {token}")));
    let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth.principal.id, alice.id);
}

#[tokio::test]
async fn missing_or_foreign_scheme_is_rejected() {
    let gw = TestGateway::new();
    let (_, token) = gw.enroll(Uuid::new_v4());
    let state = gw.app_state();

    let mut none = parts(None);
    assert_eq!(
        AuthUser::from_request_parts(&mut none, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
    let mut basic = parts(Some(&format!("Basic {token}")));
    assert_eq!(
        AuthUser::from_request_parts(&mut basic, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}
