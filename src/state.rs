//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool for the REST handlers and the coordinator,
//! which owns every piece of live room state. Nothing else is shared.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::GatewayConfig;
use crate::coordinator::Coordinator;
use crate::rate_limit::RateLimiter;
use crate::registry::RoomRegistry;
use crate::services::access::PgAccessOracle;
use crate::services::identity::JwtVerifier;
use crate::services::principal::PgPrincipalDirectory;

/// Shared application state. Clone is required by Axum; every field is
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub coordinator: Coordinator,
    /// Outbound frame queue per websocket connection.
    pub client_queue_capacity: usize,
}

impl AppState {
    /// Wire the production collaborators: JWT verification and the Postgres
    /// directory and oracle.
    #[must_use]
    pub fn new(pool: PgPool, config: &GatewayConfig) -> Self {
        let verifier = JwtVerifier::new(
            config.jwt_secret.as_bytes(),
            config.jwt_issuer.as_deref(),
            config.jwt_audience.as_deref(),
        );
        let coordinator = Coordinator::new(
            RoomRegistry::new(),
            Arc::new(verifier),
            Arc::new(PgPrincipalDirectory::new(pool.clone())),
            Arc::new(PgAccessOracle::new(pool.clone())),
        )
        .with_rate_limiter(RateLimiter::new(config.rate_limit.clone()))
        .with_handshake_timeout(config.handshake_timeout);

        Self::with_coordinator(pool, coordinator, config.client_queue_capacity)
    }

    #[must_use]
    pub fn with_coordinator(pool: PgPool, coordinator: Coordinator, client_queue_capacity: usize) -> Self {
        Self { pool, coordinator, client_queue_capacity: client_queue_capacity.max(1) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
