//! Realtime room coordinator.
//!
//! ARCHITECTURE
//! ============
//! The coordinator owns the room registry and the rate limiter, and talks to
//! three collaborators through traits: the identity verifier (token →
//! claims), the principal directory (claims → active user) and the access
//! oracle (user × room → may join). It never touches storage itself.
//!
//! Two kinds of callers:
//! - the socket loop, one connection at a time (`authenticate`, `connect`,
//!   `handle_request`, `disconnect`);
//! - REST handlers, after a database write (`broadcast_*`, `emit_to_room`).
//!
//! LIFECYCLE
//! =========
//! 1. `authenticate`: token → verified, active principal (bounded by the
//!    handshake timeout). Failure is terminal for the socket.
//! 2. `connect`: register, auto-join `user:<id>`, push `connected`.
//! 3. `handle_request`: one reply frame per request, never an error.
//! 4. `disconnect`: retract memberships, push `presence_changed offline`
//!    where the user actually left. Idempotent.

mod broadcasts;
mod requests;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DEFAULT_HANDSHAKE_TIMEOUT_MS;
use crate::frame::{self, Data, ErrorCode, Frame};
use crate::rate_limit::RateLimiter;
use crate::registry::{ConnectionId, RoomRegistry};
use crate::room::RoomId;
use crate::services::access::AccessOracle;
use crate::services::identity::{IdentityError, IdentityVerifier};
use crate::services::principal::{DirectoryError, Principal, PrincipalDirectory};

pub use requests::PresenceStatus;

// =============================================================================
// ERRORS
// =============================================================================

/// Why a connect handshake failed. Logged in full, never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("no token supplied")]
    MissingToken,
    #[error("token rejected: {0}")]
    InvalidToken(#[from] IdentityError),
    #[error("principal {0} not found")]
    PrincipalNotFound(Uuid),
    #[error("principal {0} is not active")]
    PrincipalInactive(Uuid),
    #[error("token tenant does not match principal {0}")]
    TenantMismatch(Uuid),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("principal lookup failed: {0}")]
    Directory(#[from] DirectoryError),
}

impl HandshakeError {
    /// The only text a client ever sees for a failed handshake.
    pub const CLIENT_MESSAGE: &'static str = "Authentication failed";
}

/// Non-terminal refusal of a client request. The display strings are the
/// wire contract.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum Denial {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Not authorized to join room")]
    NotAuthorized,
    #[error("Not a member of room")]
    NotMember,
    #[error("Invalid status")]
    InvalidStatus,
    #[error("Unknown event")]
    UnknownEvent,
}

impl ErrorCode for Denial {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
            Self::RateLimited => "E_RATE_LIMITED",
            Self::NotAuthorized => "E_NOT_AUTHORIZED",
            Self::NotMember => "E_NOT_MEMBER",
            Self::InvalidStatus => "E_INVALID_STATUS",
            Self::UnknownEvent => "E_UNKNOWN_EVENT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

#[derive(Clone)]
pub struct Coordinator {
    registry: RoomRegistry,
    rate_limiter: RateLimiter,
    verifier: Arc<dyn IdentityVerifier>,
    directory: Arc<dyn PrincipalDirectory>,
    oracle: Arc<dyn AccessOracle>,
    handshake_timeout: Duration,
}

impl Coordinator {
    #[must_use]
    pub fn new(
        registry: RoomRegistry,
        verifier: Arc<dyn IdentityVerifier>,
        directory: Arc<dyn PrincipalDirectory>,
        oracle: Arc<dyn AccessOracle>,
    ) -> Self {
        Self {
            registry,
            rate_limiter: RateLimiter::default(),
            verifier,
            directory,
            oracle,
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    /// Resolve a bearer token to an active principal. No retries: any failure
    /// is final for this attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`HandshakeError`] describing the failed step.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Principal, HandshakeError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(HandshakeError::MissingToken)?;

        let claims = timeout(self.handshake_timeout, self.verifier.verify(token))
            .await
            .map_err(|_| HandshakeError::Timeout("token verification"))??;

        let principal = timeout(self.handshake_timeout, self.directory.find_principal(claims.sub))
            .await
            .map_err(|_| HandshakeError::Timeout("principal lookup"))??
            .ok_or(HandshakeError::PrincipalNotFound(claims.sub))?;

        if !principal.is_active() {
            return Err(HandshakeError::PrincipalInactive(principal.id));
        }
        if principal.tenant_id != claims.tenant_id {
            return Err(HandshakeError::TenantMismatch(principal.id));
        }
        Ok(principal)
    }

    /// Register an authenticated connection, put it in its personal room and
    /// push `connected`. Returns the new connection id.
    pub async fn connect(&self, principal: Principal, tx: mpsc::Sender<Frame>) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        let user_id = principal.id;
        let tenant_id = principal.tenant_id;

        self.registry.register(connection_id, principal, tx).await;
        self.registry
            .join(connection_id, &RoomId::user(user_id))
            .await;

        let welcome = Frame::push(frame::CONNECTED, Data::new())
            .with_data("userId", user_id.to_string())
            .with_data("connectionId", connection_id.to_string())
            .with_data("timestamp", timestamp());
        self.registry.send_to(connection_id, welcome).await;

        info!(%connection_id, %user_id, %tenant_id, "gateway: client connected");
        connection_id
    }

    /// Tear a connection down. Safe to call any number of times.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        self.rate_limiter.forget(connection_id);
        let Some(departure) = self.registry.unregister(connection_id).await else {
            return;
        };
        let user_id = departure.principal.id;

        for vacated in &departure.rooms {
            if !vacated.principal_departed {
                continue;
            }
            let notice = Frame::push(frame::PRESENCE_CHANGED, Data::new())
                .with_room(vacated.room.to_string())
                .with_data("room", vacated.room.to_string())
                .with_data("userId", user_id.to_string())
                .with_data("status", PresenceStatus::Offline.as_str())
                .with_data("activeUsers", ids_json(&vacated.active_users))
                .with_data("timestamp", timestamp());
            self.registry.broadcast(&vacated.room, &notice, None).await;
        }

        info!(%connection_id, %user_id, rooms = departure.rooms.len(), "gateway: client disconnected");
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Route one client request and build its reply. Failures come back as
    /// `{success:false, error}` replies; nothing here can end the connection.
    pub async fn handle_request(&self, connection_id: ConnectionId, req: &Frame) -> Frame {
        let room = req.target_room();
        let result = match req.event.as_str() {
            frame::JOIN_ROOM => self
                .join_room(connection_id, room)
                .await
                .map(|joined| joined.into_data()),
            frame::LEAVE_ROOM => self
                .leave_room(connection_id, room)
                .await
                .map(|()| Data::new()),
            frame::TYPING_START => self
                .typing(connection_id, room, true)
                .await
                .map(|()| Data::new()),
            frame::TYPING_STOP => self
                .typing(connection_id, room, false)
                .await
                .map(|()| Data::new()),
            frame::PRESENCE_UPDATE => self
                .update_presence(connection_id, room, req.data_str("status"))
                .await
                .map(|()| Data::new()),
            _ => Err(Denial::UnknownEvent),
        };

        match result {
            Ok(data) => req.ok_with(data),
            Err(denial) => {
                if denial == Denial::NotAuthorized || denial == Denial::RateLimited {
                    warn!(%connection_id, event = %req.event, room = room.unwrap_or("-"), %denial, "gateway: request denied");
                }
                req.failure(&denial)
            }
        }
    }

    // =========================================================================
    // GUARDS
    // =========================================================================

    async fn principal_of(&self, connection_id: ConnectionId) -> Result<Arc<Principal>, Denial> {
        self.registry
            .principal(connection_id)
            .await
            .ok_or(Denial::NotAuthenticated)
    }

    fn throttle(&self, connection_id: ConnectionId, event: &str) -> Result<(), Denial> {
        self.rate_limiter
            .check(connection_id, event)
            .map_err(|_| Denial::RateLimited)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Event timestamp, RFC 3339 with millisecond precision.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub(crate) fn ids_json(ids: &[Uuid]) -> serde_json::Value {
    serde_json::Value::Array(
        ids.iter()
            .map(|id| serde_json::Value::String(id.to_string()))
            .collect(),
    )
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
