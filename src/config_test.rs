use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

const REQUIRED: &[(&str, &str)] = &[("DATABASE_URL", "postgres://localhost/deskline"), ("JWT_SECRET", "s3cret")];

#[test]
fn defaults_when_only_required_present() {
    let cfg = GatewayConfig::from_lookup(lookup_from(REQUIRED)).unwrap();

    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.database_url, "postgres://localhost/deskline");
    assert_eq!(cfg.jwt_secret, "s3cret");
    assert_eq!(cfg.jwt_issuer, None);
    assert_eq!(cfg.jwt_audience, None);
    assert_eq!(cfg.handshake_timeout, Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS));
    assert_eq!(cfg.rate_limit, RateLimitConfig::default());
    assert_eq!(cfg.client_queue_capacity, DEFAULT_CLIENT_QUEUE_CAPACITY);
    assert_eq!(cfg.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
}

#[test]
fn missing_database_url_is_an_error() {
    let err = GatewayConfig::from_lookup(lookup_from(&[("JWT_SECRET", "x")])).unwrap_err();
    assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
}

#[test]
fn blank_jwt_secret_is_an_error() {
    let err = GatewayConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "  ")]))
        .unwrap_err();
    assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
}

#[test]
fn parses_overrides() {
    let mut pairs = REQUIRED.to_vec();
    pairs.extend_from_slice(&[
        ("PORT", "8080"),
        ("JWT_ISSUER", "deskline-auth"),
        ("JWT_AUDIENCE", "helpdesk"),
        ("HANDSHAKE_TIMEOUT_MS", "250"),
        ("RATE_LIMIT_MAX", "3"),
        ("RATE_LIMIT_WINDOW_MS", "2000"),
        ("RATE_LIMITED_EVENTS", "join_room, presence_update,,"),
        ("CLIENT_QUEUE_CAPACITY", "16"),
        ("DB_MAX_CONNECTIONS", "20"),
    ]);
    let cfg = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();

    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.jwt_issuer.as_deref(), Some("deskline-auth"));
    assert_eq!(cfg.jwt_audience.as_deref(), Some("helpdesk"));
    assert_eq!(cfg.handshake_timeout, Duration::from_millis(250));
    assert_eq!(cfg.rate_limit.max_events, 3);
    assert_eq!(cfg.rate_limit.window, Duration::from_millis(2000));
    assert!(cfg.rate_limit.is_guarded("join_room"));
    assert!(cfg.rate_limit.is_guarded("presence_update"));
    assert!(!cfg.rate_limit.is_guarded("typing_start"));
    assert_eq!(cfg.rate_limit.guarded_events.len(), 2);
    assert_eq!(cfg.client_queue_capacity, 16);
    assert_eq!(cfg.db_max_connections, 20);
}

#[test]
fn unparsable_optionals_fall_back() {
    let mut pairs = REQUIRED.to_vec();
    pairs.extend_from_slice(&[("PORT", "http"), ("RATE_LIMIT_MAX", "-1"), ("CLIENT_QUEUE_CAPACITY", "0")]);
    let cfg = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();

    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.rate_limit.max_events, DEFAULT_MAX_EVENTS);
    // Zero would make every push fail; clamp to one slot.
    assert_eq!(cfg.client_queue_capacity, 1);
}

#[test]
fn empty_guarded_list_disables_throttling() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("RATE_LIMITED_EVENTS", ""));
    let cfg = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();
    assert!(cfg.rate_limit.guarded_events.is_empty());
}

#[test]
fn zero_limits_are_clamped() {
    let mut pairs = REQUIRED.to_vec();
    pairs.extend_from_slice(&[
        ("HANDSHAKE_TIMEOUT_MS", "0"),
        ("RATE_LIMIT_MAX", "0"),
        ("RATE_LIMIT_WINDOW_MS", "0"),
        ("DB_MAX_CONNECTIONS", "0"),
    ]);
    let cfg = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();

    assert_eq!(cfg.handshake_timeout, Duration::from_millis(1));
    assert_eq!(cfg.rate_limit.max_events, 1);
    assert_eq!(cfg.rate_limit.window, Duration::from_millis(1));
    assert_eq!(cfg.db_max_connections, 1);
}

#[test]
fn blank_audience_is_unset() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("JWT_AUDIENCE", " "));
    let cfg = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();
    assert_eq!(cfg.jwt_audience, None);
}
