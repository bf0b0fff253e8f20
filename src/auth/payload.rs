//! Normalized authentication payload
//!
//! What a provider strategy hands to the account resolver once the OAuth
//! exchange has completed.

use crate::error::AppError;

/// Result of a completed OAuth exchange
#[derive(Clone, PartialEq, Eq)]
pub struct AuthPayload {
    /// Strategy name, e.g. "github"
    pub provider: String,
    /// Provider's stable user ID
    pub uid: String,
    pub info: AuthInfo,
}

/// Profile fields carried by [`AuthPayload`]
#[derive(Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub name: String,
    pub nickname: String,
    pub access_token: String,
}

impl AuthPayload {
    /// Reject payloads with blank required fields.
    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("provider", &self.provider),
            ("uid", &self.uid),
            ("info.name", &self.info.name),
            ("info.nickname", &self.info.nickname),
            ("info.access_token", &self.info.access_token),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MalformedPayload(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }
}

impl std::fmt::Debug for AuthPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPayload")
            .field("provider", &self.provider)
            .field("uid", &self.uid)
            .field("info", &self.info)
            .finish()
    }
}

impl std::fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo")
            .field("name", &self.name)
            .field("nickname", &self.nickname)
            .field("access_token", &"[redacted]")
            .finish()
    }
}
