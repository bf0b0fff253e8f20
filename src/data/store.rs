//! Store traits
//!
//! The account resolver and the session gate talk to persistence only
//! through these traits. [`Database`](super::Database) implements both.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{Account, NewAccount};
use crate::error::AppError;

/// Account persistence
///
/// Write methods report unique index races as
/// [`AppError::PersistenceConflict`] and constraint rejections as
/// [`AppError::PersistenceValidation`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find the account linked to `(provider, external_id)`.
    async fn find_one(&self, provider: &str, external_id: &str)
    -> Result<Option<Account>, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, AppError>;

    /// Insert a complete account row in a single statement.
    async fn create(&self, account: &NewAccount) -> Result<Account, AppError>;

    /// Persist profile fields and token of an existing account.
    async fn save(&self, account: &Account) -> Result<(), AppError>;
}

/// Per-session key/value storage
///
/// `session_id` is the hashed session token; raw cookie tokens never reach
/// the store. Expired entries behave as absent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AppError>;

    async fn set(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn clear(&self, session_id: &str, key: &str) -> Result<(), AppError>;

    /// Remove every entry of a session.
    async fn destroy(&self, session_id: &str) -> Result<(), AppError>;

    /// Delete expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, AppError>;
}
