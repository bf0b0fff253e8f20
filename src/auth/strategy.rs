//! OAuth provider strategies
//!
//! A strategy knows how to send the user to its provider and how to turn the
//! callback `code` into a normalized [`AuthPayload`]. Everything after that
//! point is provider-agnostic.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::payload::{AuthInfo, AuthPayload};
use crate::config::AppConfig;
use crate::error::AppError;

/// Provider seam used by the login routes
#[async_trait]
pub trait OAuthStrategy: Send + Sync {
    /// Strategy name; also the `provider` of every payload it produces
    fn name(&self) -> &'static str;

    /// Provider URL the browser is redirected to, carrying the CSRF `state`
    fn authorize_url(&self, state: &str) -> Result<Url, AppError>;

    /// Trade an authorization code for the caller's identity
    async fn exchange(&self, code: &str) -> Result<AuthPayload, AppError>;
}

// =============================================================================
// GitHub
// =============================================================================

/// GitHub OAuth app strategy
pub struct GitHubStrategy {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    scope: String,
    redirect_url: String,
    authorize_url: String,
    token_url: String,
    api_url: String,
}

/// GitHub token response
///
/// GitHub answers 200 with an `error` field for rejected codes.
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    id: u64,
    name: Option<String>,
}

impl GitHubStrategy {
    pub fn new(config: &AppConfig, http_client: reqwest::Client) -> Self {
        let github = &config.auth.github;
        Self {
            http_client,
            client_id: github.client_id.clone(),
            client_secret: github.client_secret.clone(),
            scope: github.scope.clone(),
            redirect_url: config.github_redirect_url(),
            authorize_url: github.authorize_url.clone(),
            token_url: github.token_url.clone(),
            api_url: github.api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_access_token(&self, code: &str) -> Result<String, AppError> {
        let response: GitHubTokenResponse = self
            .http_client
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
                "redirect_uri": self.redirect_url,
            }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                tracing::warn!(error = %e, "GitHub code exchange failed");
                AppError::Provider("code exchange failed".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "GitHub token response could not be parsed");
                AppError::Provider("invalid token response".to_string())
            })?;

        if let Some(error) = response.error {
            tracing::warn!(
                %error,
                description = response.error_description.as_deref().unwrap_or(""),
                "GitHub rejected the authorization code"
            );
            return Err(AppError::Provider(error));
        }

        response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Provider("no access token issued".to_string()))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GitHubUser, AppError> {
        self.http_client
            .get(format!("{}/user", self.api_url))
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                tracing::warn!(error = %e, "GitHub user lookup failed");
                AppError::Provider("user lookup failed".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "GitHub user response could not be parsed");
                AppError::Provider("invalid user response".to_string())
            })
    }
}

#[async_trait]
impl OAuthStrategy for GitHubStrategy {
    fn name(&self) -> &'static str {
        "github"
    }

    fn authorize_url(&self, state: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| AppError::Config(format!("auth.github.authorize_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("scope", &self.scope)
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange(&self, code: &str) -> Result<AuthPayload, AppError> {
        let access_token = self.fetch_access_token(code).await?;
        let user = self.fetch_user(&access_token).await?;

        // Users without a public name fall back to their login.
        let name = user
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.login.clone());

        Ok(AuthPayload {
            provider: self.name().to_string(),
            uid: user.id.to_string(),
            info: AuthInfo {
                name,
                nickname: user.login,
                access_token,
            },
        })
    }
}
