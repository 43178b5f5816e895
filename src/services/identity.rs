//! Identity verification: bearer token to verified claims.
//!
//! ARCHITECTURE
//! ============
//! The gateway never issues tokens. It trusts an HS256 JWT minted by the
//! identity service and reads three claims: `sub` (user id), `tenant_id`
//! and `role`. `iss` and `aud` are checked only when configured. The verifier sits behind the `IdentityVerifier` trait so the
//! coordinator can be exercised with fakes.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

/// Claims the gateway relies on. Everything else in the token is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    #[serde(default)]
    pub role: String,
    /// Expiry, seconds since Unix epoch.
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("invalid token issuer")]
    InvalidIssuer,
    #[error("invalid token audience")]
    InvalidAudience,
    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Verifies a bearer token and returns its claims.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`IdentityError`] for expired, forged or unparsable tokens.
    async fn verify(&self, token: &str) -> Result<Claims, IdentityError>;
}

// =============================================================================
// JWT VERIFIER
// =============================================================================

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        Self { key: DecodingKey::from_secret(secret), validation }
    }

    /// Synchronous verification; the trait impl wraps this.
    ///
    /// # Errors
    ///
    /// See [`IdentityVerifier::verify`].
    pub fn verify_sync(&self, token: &str) -> Result<Claims, IdentityError> {
        use jsonwebtoken::errors::ErrorKind;

        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| {
                debug!(sub = %data.claims.sub, tenant_id = %data.claims.tenant_id, "token verified");
                data.claims
            })
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                ErrorKind::InvalidSignature => IdentityError::InvalidSignature,
                ErrorKind::InvalidIssuer => IdentityError::InvalidIssuer,
                ErrorKind::InvalidAudience => IdentityError::InvalidAudience,
                _ => IdentityError::Malformed(e.to_string()),
            })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, IdentityError> {
        self.verify_sync(token)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Token from an `Authorization` header value. Only the `Bearer` scheme is
/// accepted; an empty token counts as absent.
#[must_use]
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
