//! GitHub OAuth authentication
//!
//! Handles:
//! - Provider strategies (GitHub)
//! - Login, callback, failure and logout routes
//! - Server-side sessions and the authentication guard

mod middleware;
mod oauth;
mod payload;
pub mod session;
mod strategy;

pub use middleware::{CurrentAccount, MaybeAccount, require_auth, session_layer};
pub use oauth::auth_router;
pub use payload::{AuthInfo, AuthPayload};
pub use session::{RequestSession, SessionToken};
pub use strategy::{GitHubStrategy, OAuthStrategy};
