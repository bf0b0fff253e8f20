//! Error types for oauthgate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// No authenticated account for a protected action (303 to /login)
    #[error("Login required")]
    LoginRequired,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication payload is missing required fields (400)
    #[error("Malformed authentication payload: {0}")]
    MalformedPayload(String),

    /// Unique constraint race on first-login creation (409)
    #[error("Account already exists for this provider identity")]
    PersistenceConflict,

    /// Store rejected the record, e.g. a field length constraint (422)
    #[error("Account could not be saved: {0}")]
    PersistenceValidation(String),

    /// OAuth CSRF state missing or mismatched (401)
    #[error("OAuth state verification failed")]
    OAuthState,

    /// Provider refused or failed the exchange (502)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Classify a failed account write.
    ///
    /// Unique index violations become `PersistenceConflict`, constraint
    /// rejections become `PersistenceValidation`, anything else stays a
    /// database error.
    pub fn from_account_write(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        let kind = match &err {
            sqlx::Error::Database(db_err) => Some((db_err.kind(), db_err.message().to_string())),
            _ => None,
        };

        match kind {
            Some((ErrorKind::UniqueViolation, _)) => AppError::PersistenceConflict,
            Some((ErrorKind::CheckViolation | ErrorKind::NotNullViolation, message)) => {
                AppError::PersistenceValidation(message)
            }
            _ => AppError::Database(err),
        }
    }

    /// Short machine-readable label used in metrics and failure redirects.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::LoginRequired => "login_required",
            AppError::Validation(_) => "validation",
            AppError::MalformedPayload(_) => "malformed_payload",
            AppError::PersistenceConflict => "persistence_conflict",
            AppError::PersistenceValidation(_) => "persistence_validation",
            AppError::OAuthState => "invalid_state",
            AppError::Provider(_) => "provider",
            AppError::Database(_) => "database",
            AppError::HttpClient(_) => "http_client",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body. `LoginRequired` becomes a redirect to the
    /// login page instead.
    fn into_response(self) -> Response {
        use axum::Json;

        if let AppError::LoginRequired = self {
            return Redirect::to("/login").into_response();
        }

        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::LoginRequired => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::OAuthState => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::PersistenceConflict => (StatusCode::CONFLICT, self.to_string()),
            AppError::PersistenceValidation(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::Provider(_) | AppError::HttpClient(_) => {
                (StatusCode::BAD_GATEWAY, "Provider error".to_string())
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
