//! Bearer authentication for REST handlers.
//!
//! Uses the same verifier and directory as the websocket handshake, so a
//! token that cannot open a socket cannot call the API either.

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use tracing::warn;

use crate::coordinator::HandshakeError;
use crate::services::identity::bearer_token;
use crate::services::principal::Principal;
use crate::state::AppState;

/// Authenticated caller, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: Principal,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token);

        let app_state = AppState::from_ref(state);
        let principal = app_state
            .coordinator
            .authenticate(token)
            .await
            .map_err(handshake_error_to_status)?;
        Ok(Self { principal })
    }
}

pub(crate) fn handshake_error_to_status(err: HandshakeError) -> StatusCode {
    match err {
        HandshakeError::Directory(e) => {
            warn!(error = %e, "api: principal lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        HandshakeError::Timeout(step) => {
            warn!(step, "api: authentication timed out");
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::UNAUTHORIZED,
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
