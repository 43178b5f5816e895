//! Per-connection rate limiting for inbound socket events.
//!
//! DESIGN
//! ======
//! Fixed-window counters keyed by `(connection_id, event)`. A window is reset
//! lazily: the first event after `reset_at` starts a fresh window with a count
//! of one. No timers run in the background.
//!
//! The limiter is a reusable guard. Which events it applies to is a
//! deployment decision (`RATE_LIMITED_EVENTS`); each guarded event has its
//! own counter so typing spam cannot starve `join_room`.
//!
//! TRADE-OFFS
//! ==========
//! Rejected events still count toward the window. A client hammering the
//! gateway stays throttled until it backs off for a whole window.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::frame;

pub const DEFAULT_MAX_EVENTS: u32 = 10;
pub const DEFAULT_WINDOW_MS: u64 = 1000;
pub const DEFAULT_GUARDED_EVENTS: &[&str] = &[
    frame::JOIN_ROOM,
    frame::LEAVE_ROOM,
    frame::TYPING_START,
    frame::TYPING_STOP,
    frame::PRESENCE_UPDATE,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Events allowed per window, per connection, per event name.
    pub max_events: u32,
    pub window: Duration,
    /// Event names the guard applies to. Others pass unchecked.
    pub guarded_events: HashSet<String>,
}

impl RateLimitConfig {
    #[must_use]
    pub fn is_guarded(&self, event: &str) -> bool {
        self.guarded_events.contains(event)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
            guarded_events: DEFAULT_GUARDED_EVENTS.iter().map(|e| (*e).to_owned()).collect(),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit exceeded (max {limit} events/{window_ms}ms)")]
    Exceeded { limit: u32, window_ms: u64 },
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<Uuid, HashMap<String, Window>>>>,
    config: Arc<RateLimitConfig>,
}

struct Window {
    count: u32,
    reset_at: Instant,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), config: Arc::new(config) }
    }

    /// Count one `event` for `connection_id` and fail if the window is full.
    /// Unguarded events always pass and are not recorded.
    pub fn check(&self, connection_id: Uuid, event: &str) -> Result<(), RateLimitError> {
        self.check_at(connection_id, event, Instant::now())
    }

    /// Internal: check + record with explicit timestamp (for testing).
    pub(crate) fn check_at(&self, connection_id: Uuid, event: &str, now: Instant) -> Result<(), RateLimitError> {
        if !self.config.is_guarded(event) {
            return Ok(());
        }

        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let windows = inner.entry(connection_id).or_default();
        let window = self.config.window;

        let count = match windows.get_mut(event) {
            Some(w) if now <= w.reset_at => {
                w.count = w.count.saturating_add(1);
                w.count
            }
            Some(w) => {
                w.count = 1;
                w.reset_at = now + window;
                1
            }
            None => {
                windows.insert(event.to_owned(), Window { count: 1, reset_at: now + window });
                1
            }
        };

        if count > self.config.max_events {
            return Err(RateLimitError::Exceeded {
                limit: self.config.max_events,
                window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    /// Drop every counter for a connection. Safe to call more than once.
    pub fn forget(&self, connection_id: Uuid) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.remove(&connection_id);
    }

    /// Number of connections with live counters.
    #[cfg(test)]
    #[must_use]
    pub fn tracked_connections(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
