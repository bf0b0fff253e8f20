//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub and hands
//! the result to the account resolver and the session gate.

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;

use super::middleware::MaybeAccount;
use super::session::RequestSession;
use crate::AppState;
use crate::data::Account;
use crate::error::AppError;
use crate::metrics::record_login;

/// Cookie carrying the CSRF state between redirect and callback
const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Create authentication router
///
/// Routes:
/// - GET /login - Login page
/// - GET /auth/github - Redirect to GitHub
/// - GET /auth/github/callback - OAuth callback
/// - GET /auth/failure - Login failure page
/// - POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/auth/github", get(github_redirect))
        .route("/auth/github/callback", get(github_callback))
        .route("/auth/failure", get(failure_page))
        .route("/logout", post(logout))
}

// =============================================================================
// Login Page
// =============================================================================

/// GET /login
///
/// Renders a simple login page with GitHub sign-in button. Callers that
/// are already signed in go straight home.
async fn login_page(MaybeAccount(account): MaybeAccount) -> Response {
    if account.is_some() {
        return Redirect::to("/").into_response();
    }

    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in</title></head>
<body>
    <h1>Sign in</h1>
    <p>Please sign in with GitHub</p>
    <a href="/auth/github">Sign in with GitHub</a>
</body>
</html>
"#,
    )
    .into_response()
}

// =============================================================================
// GitHub OAuth
// =============================================================================

/// GET /auth/github
///
/// Redirects user to GitHub authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to GitHub with client_id, redirect_uri, scope, state
async fn github_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();
    let authorize_url = state.strategy.authorize_url(&csrf_state)?;

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, csrf_state))
        .path("/")
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .build();

    tracing::debug!(strategy = state.strategy.name(), "Redirecting to provider");
    Ok((jar.add(cookie), Redirect::to(authorize_url.as_str())))
}

/// Query parameters from GitHub callback
///
/// GitHub sends either `code` and `state`, or `error` when the user
/// declines the authorization.
#[derive(Debug, Default, Deserialize)]
struct GitHubCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /auth/github/callback
///
/// Handles OAuth callback from GitHub.
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for the normalized identity
/// 3. Find or create the local account
/// 4. Store the account in the session
/// 5. Redirect to home
///
/// Any failure redirects to `/auth/failure` and leaves the session
/// anonymous.
async fn github_callback(
    State(state): State<AppState>,
    session: RequestSession,
    jar: CookieJar,
    Query(query): Query<GitHubCallbackQuery>,
) -> Response {
    let expected_state = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value().to_string());
    let jar = jar.remove(Cookie::build((OAUTH_STATE_COOKIE, "")).path("/").build());
    let strategy = state.strategy.name();

    match complete_login(&state, &session, expected_state.as_deref(), query).await {
        Ok(account) => {
            record_login(strategy, "success");
            tracing::info!(
                account_id = %account.id,
                nickname = %account.nickname,
                strategy,
                "Login succeeded"
            );
            (jar, Redirect::to("/")).into_response()
        }
        Err(error) => {
            record_login(strategy, "failure");
            tracing::warn!(%error, strategy, "Login failed");
            let location = format!(
                "/auth/failure?message={}&strategy={}",
                urlencoding::encode(&failure_message(&error)),
                urlencoding::encode(strategy),
            );
            (jar, Redirect::to(&location)).into_response()
        }
    }
}

async fn complete_login(
    state: &AppState,
    session: &RequestSession,
    expected_state: Option<&str>,
    query: GitHubCallbackQuery,
) -> Result<Account, AppError> {
    if let Some(error) = query.error {
        return Err(AppError::Provider(error));
    }

    verify_csrf_state(query.state.as_deref(), expected_state)?;

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Provider("missing authorization code".to_string()))?;

    let payload = state.strategy.exchange(&code).await?;
    let account = state.resolver.resolve_account(&payload).await?;
    session.set_current_account(&account).await?;

    Ok(account)
}

/// Query parameters of the failure page
#[derive(Debug, Deserialize)]
struct FailureQuery {
    message: Option<String>,
    strategy: Option<String>,
}

/// GET /auth/failure
///
/// Shows why the last login attempt failed.
async fn failure_page(Query(query): Query<FailureQuery>) -> impl IntoResponse {
    let message = query.message.unwrap_or_else(|| "unknown_error".to_string());
    let strategy = query.strategy.unwrap_or_else(|| "unknown".to_string());

    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in failed</title></head>
<body>
    <h1>Sign in failed</h1>
    <p>Could not sign in with {}: {}</p>
    <a href="/login">Try again</a>
</body>
</html>
"#,
        html_escape::encode_text(&strategy),
        html_escape::encode_text(&message),
    );

    (StatusCode::UNAUTHORIZED, Html(body))
}

// =============================================================================
// Logout
// =============================================================================

/// POST /logout
///
/// Clears the session identity and redirects to login. The session layer
/// removes the cookie.
async fn logout(session: RequestSession) -> Result<Redirect, AppError> {
    session.clear().await?;
    Ok(Redirect::to("/login"))
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(received: Option<&str>, expected: Option<&str>) -> Result<(), AppError> {
    match (received, expected) {
        (Some(received), Some(expected)) if !expected.is_empty() && received == expected => Ok(()),
        _ => Err(AppError::OAuthState),
    }
}

/// Failure reason shown on the failure page
fn failure_message(error: &AppError) -> String {
    match error {
        AppError::Provider(message) => message.clone(),
        other => other.kind().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_state_is_random_and_url_safe() {
        let first = generate_csrf_state();
        let second = generate_csrf_state();
        assert_ne!(first, second);
        assert_eq!(URL_SAFE_NO_PAD.decode(&first).unwrap().len(), 32);
    }

    #[test]
    fn csrf_state_must_match_cookie() {
        assert!(verify_csrf_state(Some("abc"), Some("abc")).is_ok());
        assert!(matches!(
            verify_csrf_state(Some("abc"), Some("xyz")),
            Err(AppError::OAuthState)
        ));
        assert!(matches!(
            verify_csrf_state(None, Some("abc")),
            Err(AppError::OAuthState)
        ));
        assert!(matches!(
            verify_csrf_state(Some("abc"), None),
            Err(AppError::OAuthState)
        ));
        assert!(matches!(
            verify_csrf_state(Some(""), Some("")),
            Err(AppError::OAuthState)
        ));
    }

    #[test]
    fn failure_message_prefers_provider_reason() {
        assert_eq!(
            failure_message(&AppError::Provider("access_denied".to_string())),
            "access_denied"
        );
        assert_eq!(failure_message(&AppError::OAuthState), "invalid_state");
        assert_eq!(
            failure_message(&AppError::MalformedPayload("missing uid".to_string())),
            "malformed_payload"
        );
    }
}
