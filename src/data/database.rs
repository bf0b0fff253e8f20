//! SQLite database operations
//!
//! All database access goes through this module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use super::store::{AccountStore, SessionStore};
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Create connection string
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        // Create connection pool
        let pool = SqlitePool::connect(&connection_string).await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Count stored accounts.
    pub async fn count_accounts(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Delete an account by ID, leaving any session that references it stale.
    ///
    /// # Returns
    /// `true` if a row was deleted.
    #[cfg(test)]
    pub(crate) async fn delete_account(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

// =========================================================================
// Accounts
// =========================================================================

#[async_trait]
impl AccountStore for Database {
    async fn find_one(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE provider = ? AND external_id = ?",
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    async fn create(&self, new_account: &NewAccount) -> Result<Account, AppError> {
        let now = Utc::now();
        let account = Account {
            id: EntityId::new().0,
            provider: new_account.provider.clone(),
            external_id: new_account.external_id.clone(),
            display_name: new_account.display_name.clone(),
            nickname: new_account.nickname.clone(),
            access_token: new_account.access_token.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, provider, external_id, display_name, nickname, access_token,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.provider)
        .bind(&account.external_id)
        .bind(&account.display_name)
        .bind(&account.nickname)
        .bind(&account.access_token)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_account_write)?;

        Ok(account)
    }

    async fn save(&self, account: &Account) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET display_name = ?, nickname = ?, access_token = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.display_name)
        .bind(&account.nickname)
        .bind(&account.access_token)
        .bind(account.updated_at)
        .bind(&account.id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_account_write)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}

// =========================================================================
// Sessions
// =========================================================================

#[async_trait]
impl SessionStore for Database {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AppError> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM session_entries
            WHERE token_hash = ? AND key = ? AND expires_at > ?
            "#,
        )
        .bind(session_id)
        .bind(key)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO session_entries (token_hash, key, value, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(token_hash, key) DO UPDATE
            SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(session_id)
        .bind(key)
        .bind(value)
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, session_id: &str, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM session_entries WHERE token_hash = ? AND key = ?")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM session_entries WHERE token_hash = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM session_entries WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
