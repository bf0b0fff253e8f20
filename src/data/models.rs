//! Data models
//!
//! Rust structs representing database entities.
//! Accounts use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Account
// =============================================================================

/// A local account linked to one provider identity
///
/// `(provider, external_id)` is unique across the table.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    /// OAuth issuer, e.g. "github"
    pub provider: String,
    /// Issuer's stable user identifier
    pub external_id: String,
    pub display_name: String,
    /// Provider handle (GitHub login)
    pub nickname: String,
    /// Provider access token. Never sent to clients.
    #[serde(skip_serializing, default)]
    pub access_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("external_id", &self.external_id)
            .field("display_name", &self.display_name)
            .field("nickname", &self.nickname)
            .field("access_token", &"[redacted]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields for a first-login insert
///
/// Carries the profile fields together with the identity pair so the row
/// is complete the moment it exists.
#[derive(Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub provider: String,
    pub external_id: String,
    pub display_name: String,
    pub nickname: String,
    pub access_token: String,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("provider", &self.provider)
            .field("external_id", &self.external_id)
            .field("display_name", &self.display_name)
            .field("nickname", &self.nickname)
            .field("access_token", &"[redacted]")
            .finish()
    }
}
