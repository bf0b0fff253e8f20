//! Common test utilities for E2E tests

#![allow(dead_code)]

use axum::{
    Json, Router,
    http::HeaderMap,
    routing::{get, post},
};
use oauthgate::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
///
/// Runs the full router against a temporary database and a fake GitHub.
pub struct TestServer {
    pub addr: String,
    pub github_addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let github_addr = spawn_fake_github().await;

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "https".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            auth: config::AuthConfig {
                session_max_age: 604800,
                session_purge_interval_seconds: 3600,
                github: config::GitHubOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    scope: "read:user".to_string(),
                    redirect_url: None,
                    authorize_url: format!("{github_addr}/login/oauth/authorize"),
                    token_url: format!("{github_addr}/login/oauth/access_token"),
                    api_url: format!("{github_addr}/api"),
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config.clone()).await.unwrap();

        // Redirects are inspected, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = oauthgate::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            github_addr,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Start a login and return `(csrf_state, oauth_state cookie value)`
    pub async fn begin_login(&self) -> (String, String) {
        let response = self
            .client
            .get(self.url("/auth/github"))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        let location = location(&response);
        let redirect = url::Url::parse(&location).unwrap();
        let state = redirect
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("authorize URL carries state");
        let cookie = set_cookie_value(&response, "oauth_state").expect("oauth_state cookie");

        (state, cookie)
    }

    /// Run the full GitHub flow for `code` and return the session cookie
    pub async fn login(&self, code: &str) -> String {
        let (state, oauth_cookie) = self.begin_login().await;

        let response = self
            .client
            .get(self.url(&format!(
                "/auth/github/callback?code={code}&state={state}"
            )))
            .header("Cookie", format!("oauth_state={oauth_cookie}"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 303);
        assert_eq!(location(&response), "/");
        set_cookie_value(&response, "session").expect("session cookie issued")
    }

    /// GET `path` presenting the given session cookie
    pub async fn get_with_session(&self, path: &str, session: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Cookie", format!("session={session}"))
            .send()
            .await
            .unwrap()
    }
}

/// Location header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// All Set-Cookie header values
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// Value of the cookie `name` set by the response, if any
pub fn set_cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response).into_iter().find_map(|header| {
        header
            .split(';')
            .next()
            .and_then(|pair| pair.trim().strip_prefix(&prefix))
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    })
}

// =============================================================================
// Fake GitHub
// =============================================================================

/// Known authorization codes and the profile each one signs in as
fn github_profile(code: &str) -> Option<Value> {
    match code {
        "code-octocat" => Some(json!({ "id": 1, "login": "octocat", "name": "The Octocat" })),
        "code-octocat-renamed" => Some(json!({ "id": 1, "login": "octocat", "name": "Mona Lisa" })),
        "code-hubot" => Some(json!({ "id": 2, "login": "hubot", "name": null })),
        // Longer than the accounts.display_name column allows
        "code-long-name" => Some(json!({ "id": 3, "login": "verbose", "name": "n".repeat(400) })),
        _ => None,
    }
}

async fn fake_token(Json(body): Json<Value>) -> Json<Value> {
    let code = body["code"].as_str().unwrap_or_default();
    if body["client_secret"] != "test-client-secret" || github_profile(code).is_none() {
        return Json(json!({ "error": "bad_verification_code" }));
    }

    Json(json!({
        "access_token": format!("token-{code}"),
        "token_type": "bearer",
        "scope": "read:user",
    }))
}

async fn fake_user(headers: HeaderMap) -> Result<Json<Value>, axum::http::StatusCode> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer token-"))
        .and_then(github_profile)
        .map(Json)
        .ok_or(axum::http::StatusCode::UNAUTHORIZED)
}

async fn spawn_fake_github() -> String {
    let app = Router::new()
        .route("/login/oauth/access_token", post(fake_token))
        .route("/api/user", get(fake_user));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}
