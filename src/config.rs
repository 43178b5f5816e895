//! Gateway configuration parsed from environment variables.
//!
//! Required:
//! - `DATABASE_URL`
//! - `JWT_SECRET`
//!
//! Optional:
//! - `PORT`: default 3000
//! - `JWT_ISSUER`: expected `iss` claim, unchecked when absent
//! - `JWT_AUDIENCE`: expected `aud` claim, unchecked when absent
//! - `HANDSHAKE_TIMEOUT_MS`: default 5000
//! - `RATE_LIMIT_MAX`: default 10
//! - `RATE_LIMIT_WINDOW_MS`: default 1000
//!
//! Numeric settings are clamped to at least 1; a zero timeout or budget
//! would reject every handshake or every guarded event.
//! - `RATE_LIMITED_EVENTS`: comma list, default every client event
//! - `CLIENT_QUEUE_CAPACITY`: default 256
//! - `DB_MAX_CONNECTIONS`: default 5

use std::time::Duration;

use crate::rate_limit::{DEFAULT_GUARDED_EVENTS, DEFAULT_MAX_EVENTS, DEFAULT_WINDOW_MS, RateLimitConfig};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    /// Upper bound on each external call of the connect handshake.
    pub handshake_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    /// Outbound frame queue per connection.
    pub client_queue_capacity: usize,
    pub db_max_connections: u32,
}

impl GatewayConfig {
    /// Build typed config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from any key lookup. Unparsable optional values
    /// fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let guarded_events = match lookup("RATE_LIMITED_EVENTS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_owned)
                .collect(),
            None => DEFAULT_GUARDED_EVENTS.iter().map(|e| (*e).to_owned()).collect(),
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            database_url,
            jwt_secret,
            jwt_issuer: optional("JWT_ISSUER"),
            jwt_audience: optional("JWT_AUDIENCE"),
            handshake_timeout: Duration::from_millis(
                parse_or(&lookup, "HANDSHAKE_TIMEOUT_MS", DEFAULT_HANDSHAKE_TIMEOUT_MS).max(1),
            ),
            rate_limit: RateLimitConfig {
                max_events: parse_or(&lookup, "RATE_LIMIT_MAX", DEFAULT_MAX_EVENTS).max(1),
                window: Duration::from_millis(parse_or(&lookup, "RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS).max(1)),
                guarded_events,
            },
            client_queue_capacity: parse_or(&lookup, "CLIENT_QUEUE_CAPACITY", DEFAULT_CLIENT_QUEUE_CAPACITY).max(1),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS).max(1),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
