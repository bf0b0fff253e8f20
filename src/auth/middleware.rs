//! Session layer, authentication middleware and extractors
//!
//! The session layer attaches a [`RequestSession`] to every request and
//! writes the session cookie afterwards. Protected routes use
//! [`require_auth`] or the [`CurrentAccount`] extractor.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Duration;

use super::session::{CookieChange, RequestSession, SESSION_COOKIE, SessionToken};
use crate::AppState;
use crate::data::Account;
use crate::error::AppError;

/// Browser-session cookie; expiry is enforced server-side by the store.
fn build_session_cookie(token: &SessionToken, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Middleware attaching the caller's session to the request
///
/// Reads the `session` cookie, exposes a [`RequestSession`] through request
/// extensions, and issues or removes the cookie once the handler is done.
///
/// # Usage
/// ```ignore
/// let app = Router::new()
///     .route("/", get(home))
///     .layer(middleware::from_fn_with_state(state.clone(), session_layer));
/// ```
pub async fn session_layer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let token = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| SessionToken::parse(cookie.value()));

    let session = RequestSession::new(
        state.db.clone(),
        state.db.clone(),
        Duration::seconds(state.config.auth.session_max_age),
        token,
    );
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    match session.cookie_change().await {
        CookieChange::Keep => response,
        CookieChange::Issue(token) => {
            let cookie = build_session_cookie(&token, state.config.should_use_secure_cookies());
            (jar.add(cookie), response).into_response()
        }
        CookieChange::Remove => (jar.remove(clear_session_cookie()), response).into_response(),
    }
}

/// Middleware to require authentication
///
/// Anonymous callers are redirected to `/login` and the wrapped handler
/// never runs. The resolved account is added to request extensions.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/me", get(me))
///     .route_layer(middleware::from_fn(require_auth));
/// ```
pub async fn require_auth(mut request: Request, next: Next) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<RequestSession>()
        .cloned()
        .ok_or_else(missing_session_layer)?;

    let account = session.require_authentication().await?;
    request.extensions_mut().insert(CurrentAccount(account));

    Ok(next.run(request).await)
}

fn missing_session_layer() -> AppError {
    AppError::Internal(anyhow::anyhow!("session layer is not installed"))
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestSession>()
            .cloned()
            .ok_or_else(missing_session_layer)
    }
}

/// Extractor for the authenticated account
///
/// Rejects anonymous callers with a redirect to `/login`.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentAccount(account): CurrentAccount) -> impl IntoResponse {
///     format!("Hello, {}", account.nickname)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentAccount>().cloned() {
            return Ok(current);
        }

        let session = RequestSession::from_request_parts(parts, state).await?;
        let account = session.require_authentication().await?;
        Ok(CurrentAccount(account))
    }
}

/// Optional account extractor
///
/// Returns None if not authenticated, instead of redirecting.
#[derive(Debug, Clone)]
pub struct MaybeAccount(pub Option<Account>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAccount
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = RequestSession::from_request_parts(parts, state).await?;
        Ok(MaybeAccount(session.current_account().await?))
    }
}
