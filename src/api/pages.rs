//! Protected pages
//!
//! Everything here sits behind [`require_auth`](crate::auth::require_auth).

use axum::{
    Json, Router, middleware,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::AppState;
use crate::auth::{CurrentAccount, require_auth};

/// Create the router for signed-in pages
///
/// Routes:
/// - GET / - Home page
/// - GET /me - Current account as JSON
pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/me", get(me))
        .route_layer(middleware::from_fn(require_auth))
}

/// GET /
async fn home(CurrentAccount(account): CurrentAccount) -> impl IntoResponse {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Home</title></head>
<body>
    <h1>Welcome, {}</h1>
    <p>Signed in as @{}</p>
    <form method="post" action="/logout">
        <button type="submit">Sign out</button>
    </form>
</body>
</html>
"#,
        html_escape::encode_text(&account.display_name),
        html_escape::encode_text(&account.nickname),
    ))
}

/// GET /me
///
/// The provider access token is never serialized.
async fn me(CurrentAccount(account): CurrentAccount) -> impl IntoResponse {
    Json(account)
}
