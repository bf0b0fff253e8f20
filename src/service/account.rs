//! Account resolution
//!
//! Links a provider identity to exactly one local account and keeps its
//! profile current on every login.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::AuthPayload;
use crate::data::{Account, AccountStore, NewAccount};
use crate::error::AppError;
use crate::metrics::{ACCOUNT_CONFLICTS_TOTAL, ACCOUNTS_CREATED_TOTAL};

/// Find/create attempts before a persistent conflict is surfaced.
const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Account resolver
pub struct AccountResolver {
    store: Arc<dyn AccountStore>,
}

impl AccountResolver {
    /// Create new account resolver
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Find or create the account for a completed OAuth exchange
    ///
    /// # Steps
    /// 1. Validate the payload (nothing is written for malformed input)
    /// 2. Look up the account by `(provider, uid)`
    /// 3. Existing account: overwrite name, nickname and token, then save
    /// 4. No account: insert a complete row
    /// 5. Insert lost a race on the unique index: re-fetch and update
    ///
    /// # Errors
    /// - `MalformedPayload` if required payload fields are blank
    /// - `PersistenceValidation` if the store rejects the row
    /// - `PersistenceConflict` if the race persists past the retry budget
    pub async fn resolve_account(&self, payload: &AuthPayload) -> Result<Account, AppError> {
        payload.validate()?;

        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            if let Some(account) = self.store.find_one(&payload.provider, &payload.uid).await? {
                match self.refresh(account, payload).await {
                    Ok(account) => return Ok(account),
                    // Row vanished between lookup and save; start over.
                    Err(AppError::NotFound) => continue,
                    Err(e) => return Err(e),
                }
            }

            match self.store.create(&new_account(payload)).await {
                Ok(account) => {
                    ACCOUNTS_CREATED_TOTAL.inc();
                    tracing::info!(
                        account_id = %account.id,
                        provider = %account.provider,
                        nickname = %account.nickname,
                        "Account created on first login"
                    );
                    return Ok(account);
                }
                Err(AppError::PersistenceConflict) => {
                    ACCOUNT_CONFLICTS_TOTAL.inc();
                    tracing::debug!(
                        attempt,
                        provider = %payload.provider,
                        uid = %payload.uid,
                        "Concurrent first login detected; re-fetching account"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(
            provider = %payload.provider,
            uid = %payload.uid,
            "Account resolution kept conflicting"
        );
        Err(AppError::PersistenceConflict)
    }

    async fn refresh(&self, mut account: Account, payload: &AuthPayload) -> Result<Account, AppError> {
        account.display_name = payload.info.name.clone();
        account.nickname = payload.info.nickname.clone();
        account.access_token = payload.info.access_token.clone();
        account.updated_at = Utc::now();

        self.store.save(&account).await?;

        tracing::debug!(account_id = %account.id, "Account profile refreshed");
        Ok(account)
    }
}

fn new_account(payload: &AuthPayload) -> NewAccount {
    NewAccount {
        provider: payload.provider.clone(),
        external_id: payload.uid.clone(),
        display_name: payload.info.name.clone(),
        nickname: payload.info.nickname.clone(),
        access_token: payload.info.access_token.clone(),
    }
}
