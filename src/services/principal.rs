//! Principal directory: who is behind a verified token.
//!
//! A valid signature is not enough to connect: the user row must still exist
//! and be `active`. Deactivating a user therefore locks them out of the
//! gateway on their next connect, even with an unexpired token.

use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalStatus {
    Active,
    Inactive,
    Suspended,
}

impl PrincipalStatus {
    /// Unknown values are treated as inactive.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => Self::Active,
            "suspended" => Self::Suspended,
            _ => Self::Inactive,
        }
    }
}

/// An authenticated user as the gateway sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub status: PrincipalStatus,
}

impl Principal {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active
    }

    /// Display sub-object attached to `user_joined`.
    #[must_use]
    pub fn display(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "avatarUrl": self.avatar_url,
        })
    }

    /// Minimal display fields attached to `typing_indicator`.
    #[must_use]
    pub fn display_minimal(&self) -> serde_json::Value {
        serde_json::json!({ "id": self.id, "name": self.name })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Looks up principals by id.
#[async_trait::async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] if the backing store fails.
    async fn find_principal(&self, user_id: Uuid) -> Result<Option<Principal>, DirectoryError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgPrincipalDirectory {
    pool: PgPool,
}

impl PgPrincipalDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PrincipalDirectory for PgPrincipalDirectory {
    async fn find_principal(&self, user_id: Uuid) -> Result<Option<Principal>, DirectoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, role, name, email, avatar_url, status
             FROM users
             WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Principal {
            id: r.get("id"),
            tenant_id: r.get("tenant_id"),
            role: r.get("role"),
            name: r.get("name"),
            email: r.get("email"),
            avatar_url: r.get("avatar_url"),
            status: PrincipalStatus::parse(r.get::<&str, _>("status")),
        }))
    }
}

/// Keep only the ids that belong to active users of `tenant_id`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn filter_tenant_members(pool: &PgPool, tenant_id: Uuid, user_ids: &[Uuid]) -> Result<Vec<Uuid>, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_scalar(
        "SELECT id FROM users
         WHERE tenant_id = $1 AND status = 'active' AND id = ANY($2)",
    )
    .bind(tenant_id)
    .bind(user_ids)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
#[path = "principal_test.rs"]
mod tests;
