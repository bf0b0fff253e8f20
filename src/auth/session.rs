//! Session management
//!
//! Sessions live server-side in a [`SessionStore`]. The browser only holds a
//! random token in the `session` cookie; the store sees its SHA-256 hash.
//!
//! A [`RequestSession`] is built once per request by the session layer and
//! carries the identity slot operations of the session gate.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::data::{Account, AccountStore, SessionStore};
use crate::error::AppError;

/// Session cookie name
pub const SESSION_COOKIE: &str = "session";

/// Session key holding the current account ID
const ACCOUNT_ID_KEY: &str = "account_id";

/// Opaque session token as sent in the cookie
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a random 256-bit token
    pub fn generate() -> Self {
        let mut bytes = [0_u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accept a token from a cookie value
    ///
    /// Returns `None` for values that could not have been issued here.
    pub fn parse(raw: &str) -> Option<Self> {
        let decoded = URL_SAFE_NO_PAD.decode(raw).ok()?;
        (decoded.len() == 32).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key for this token
    pub fn storage_id(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        format!("sha256:{}", URL_SAFE_NO_PAD.encode(digest))
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken([redacted])")
    }
}

/// What the session layer must do with the cookie after the handler ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieChange {
    /// Nothing to send
    Keep,
    /// Issue (or replace) the session cookie
    Issue(SessionToken),
    /// Remove the session cookie
    Remove,
}

struct SessionState {
    token: SessionToken,
    cookie: CookieChange,
    /// Memoized identity lookup; `None` until first resolved
    current: Option<Option<Account>>,
}

/// Per-request handle on the caller's session
///
/// Cheap to clone; clones share the same state so the current account is
/// looked up at most once per request.
#[derive(Clone)]
pub struct RequestSession {
    sessions: Arc<dyn SessionStore>,
    accounts: Arc<dyn AccountStore>,
    max_age: Duration,
    state: Arc<Mutex<SessionState>>,
}

impl RequestSession {
    /// Attach to the session identified by `token`, or start a fresh one.
    ///
    /// A fresh token is not sent to the client until something is stored.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountStore>,
        max_age: Duration,
        token: Option<SessionToken>,
    ) -> Self {
        Self {
            sessions,
            accounts,
            max_age,
            state: Arc::new(Mutex::new(SessionState {
                token: token.unwrap_or_else(SessionToken::generate),
                cookie: CookieChange::Keep,
                current: None,
            })),
        }
    }

    /// Store `account` as the session identity.
    ///
    /// The session token is renewed on every login so a token planted before
    /// authentication never becomes authenticated. Any previous identity is
    /// replaced.
    pub async fn set_current_account(&self, account: &Account) -> Result<(), AppError> {
        let mut state = self.state.lock().await;

        self.sessions.destroy(&state.token.storage_id()).await?;

        let token = SessionToken::generate();
        self.sessions
            .set(
                &token.storage_id(),
                ACCOUNT_ID_KEY,
                &account.id,
                Utc::now() + self.max_age,
            )
            .await?;

        state.token = token.clone();
        state.cookie = CookieChange::Issue(token);
        state.current = Some(Some(account.clone()));

        tracing::debug!(account_id = %account.id, "Session identity set");
        Ok(())
    }

    /// Account referenced by the session, if any.
    ///
    /// A reference to an account that no longer exists counts as anonymous.
    pub async fn current_account(&self) -> Result<Option<Account>, AppError> {
        let mut state = self.state.lock().await;
        if let Some(current) = &state.current {
            return Ok(current.clone());
        }

        let session_id = state.token.storage_id();
        let account = match self.sessions.get(&session_id, ACCOUNT_ID_KEY).await? {
            Some(account_id) => {
                let account = self.accounts.find_by_id(&account_id).await?;
                if account.is_none() {
                    tracing::debug!(%account_id, "Session references a missing account");
                }
                account
            }
            None => None,
        };

        state.current = Some(account.clone());
        Ok(account)
    }

    pub async fn is_authenticated(&self) -> Result<bool, AppError> {
        Ok(self.current_account().await?.is_some())
    }

    /// Guard for protected actions.
    ///
    /// # Errors
    /// `LoginRequired` when the session is anonymous; it renders as a
    /// redirect to the login page.
    pub async fn require_authentication(&self) -> Result<Account, AppError> {
        self.current_account().await?.ok_or(AppError::LoginRequired)
    }

    /// Log out: drop the identity slot and the cookie.
    pub async fn clear(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;

        self.sessions
            .clear(&state.token.storage_id(), ACCOUNT_ID_KEY)
            .await?;

        state.cookie = CookieChange::Remove;
        state.current = Some(None);
        Ok(())
    }

    /// Pending cookie change for the response.
    pub async fn cookie_change(&self) -> CookieChange {
        self.state.lock().await.cookie.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Database, EntityId, MockAccountStore, MockSessionStore, NewAccount};
    use tempfile::TempDir;

    async fn test_db() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        (Arc::new(db), temp_dir)
    }

    async fn create_account(db: &Database, uid: &str) -> Account {
        db.create(&NewAccount {
            provider: "github".to_string(),
            external_id: uid.to_string(),
            display_name: "Ada".to_string(),
            nickname: "ada".to_string(),
            access_token: "tok1".to_string(),
        })
        .await
        .unwrap()
    }

    fn session_for(db: &Arc<Database>, token: Option<SessionToken>) -> RequestSession {
        RequestSession::new(db.clone(), db.clone(), Duration::hours(1), token)
    }

    fn issued_token(change: CookieChange) -> SessionToken {
        match change {
            CookieChange::Issue(token) => token,
            other => panic!("expected a session cookie, got {other:?}"),
        }
    }

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            provider: "github".to_string(),
            external_id: "42".to_string(),
            display_name: "Ada".to_string(),
            nickname: "ada".to_string(),
            access_token: "tok1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trips_through_parse() {
        let token = SessionToken::generate();
        assert_eq!(SessionToken::parse(token.as_str()), Some(token.clone()));
        assert!(token.storage_id().starts_with("sha256:"));
        assert_ne!(token.storage_id(), token.as_str());
    }

    #[test]
    fn parse_rejects_foreign_values() {
        assert!(SessionToken::parse("").is_none());
        assert!(SessionToken::parse("not a token").is_none());
        assert!(SessionToken::parse("c2hvcnQ").is_none());
    }

    #[tokio::test]
    async fn fresh_session_is_anonymous() {
        let (db, _temp_dir) = test_db().await;
        let session = session_for(&db, None);

        assert!(!session.is_authenticated().await.unwrap());
        assert!(session.current_account().await.unwrap().is_none());
        assert_eq!(session.cookie_change().await, CookieChange::Keep);
    }

    #[tokio::test]
    async fn set_current_account_is_visible_on_next_request() {
        let (db, _temp_dir) = test_db().await;
        let account = create_account(&db, "42").await;

        let login = session_for(&db, None);
        login.set_current_account(&account).await.unwrap();
        assert_eq!(
            login.current_account().await.unwrap().map(|a| a.id),
            Some(account.id.clone())
        );

        let token = issued_token(login.cookie_change().await);
        let next_request = session_for(&db, Some(token));
        let current = next_request.current_account().await.unwrap().unwrap();
        assert_eq!(current.id, account.id);
    }

    #[tokio::test]
    async fn relogin_switches_identity_and_renews_token() {
        let (db, _temp_dir) = test_db().await;
        let ada = create_account(&db, "42").await;
        let grace = create_account(&db, "43").await;

        let first = session_for(&db, None);
        first.set_current_account(&ada).await.unwrap();
        let first_token = issued_token(first.cookie_change().await);

        let second = session_for(&db, Some(first_token.clone()));
        second.set_current_account(&grace).await.unwrap();
        let second_token = issued_token(second.cookie_change().await);
        assert_ne!(first_token, second_token);

        let after = session_for(&db, Some(second_token));
        assert_eq!(after.current_account().await.unwrap().unwrap().id, grace.id);

        // The replaced token no longer carries any identity
        let stale = session_for(&db, Some(first_token));
        assert!(!stale.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn clear_makes_session_anonymous() {
        let (db, _temp_dir) = test_db().await;
        let account = create_account(&db, "42").await;

        let login = session_for(&db, None);
        login.set_current_account(&account).await.unwrap();
        let token = issued_token(login.cookie_change().await);

        let logout = session_for(&db, Some(token.clone()));
        assert!(logout.is_authenticated().await.unwrap());
        logout.clear().await.unwrap();
        assert!(!logout.is_authenticated().await.unwrap());
        assert_eq!(logout.cookie_change().await, CookieChange::Remove);

        let later = session_for(&db, Some(token));
        assert!(!later.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn deleted_account_reference_is_anonymous() {
        let (db, _temp_dir) = test_db().await;
        let account = create_account(&db, "42").await;

        let login = session_for(&db, None);
        login.set_current_account(&account).await.unwrap();
        let token = issued_token(login.cookie_change().await);

        db.delete_account(&account.id).await.unwrap();

        let next_request = session_for(&db, Some(token));
        assert!(next_request.current_account().await.unwrap().is_none());
        assert!(matches!(
            next_request.require_authentication().await,
            Err(AppError::LoginRequired)
        ));
    }

    #[tokio::test]
    async fn require_authentication_returns_account() {
        let (db, _temp_dir) = test_db().await;
        let account = create_account(&db, "42").await;

        let session = session_for(&db, None);
        assert!(matches!(
            session.require_authentication().await,
            Err(AppError::LoginRequired)
        ));

        session.set_current_account(&account).await.unwrap();
        assert_eq!(
            session.require_authentication().await.unwrap().id,
            account.id
        );
    }

    #[tokio::test]
    async fn current_account_is_looked_up_once_per_request() {
        let account_id = EntityId::new().0;

        let mut sessions = MockSessionStore::new();
        let stored_id = account_id.clone();
        sessions
            .expect_get()
            .times(1)
            .returning(move |_, _| Ok(Some(stored_id.clone())));

        let mut accounts = MockAccountStore::new();
        accounts
            .expect_find_by_id()
            .times(1)
            .returning(|id| Ok(Some(account(id))));

        let session = RequestSession::new(
            Arc::new(sessions),
            Arc::new(accounts),
            Duration::hours(1),
            Some(SessionToken::generate()),
        );

        // Clones share the memo
        let handle = session.clone();
        assert!(session.is_authenticated().await.unwrap());
        assert_eq!(
            handle.current_account().await.unwrap().unwrap().id,
            account_id
        );
        assert!(handle.require_authentication().await.is_ok());
    }
}
