// src/types/session.rs
//! Per-platform authentication state

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::job::Platform;

/// Identity string used when a session carries none of its own
pub const DEFAULT_IDENTITY: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthErrorKind {
    CredentialsMissing,
    ChallengeDetected,
    Timeout,
    Rejected,
    Network,
    Unsupported,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthErrorKind::CredentialsMissing => "credentials-missing",
            AuthErrorKind::ChallengeDetected => "challenge-detected",
            AuthErrorKind::Timeout => "timeout",
            AuthErrorKind::Rejected => "rejected",
            AuthErrorKind::Network => "network",
            AuthErrorKind::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub platform: Platform,
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
    #[serde(default = "default_identity")]
    pub identity_string: String,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AuthErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(default = "Utc::now")]
    pub obtained_at: DateTime<Utc>,
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}

impl AuthSession {
    /// Empty, unauthenticated session created at orchestration start
    pub fn empty(platform: Platform) -> Self {
        Self {
            platform,
            cookies: Vec::new(),
            identity_string: default_identity(),
            is_authenticated: false,
            error: None,
            error_details: None,
            obtained_at: Utc::now(),
        }
    }

    pub fn authenticated(platform: Platform, cookies: Vec<SessionCookie>, identity: &str) -> Self {
        Self {
            cookies,
            identity_string: identity.to_string(),
            is_authenticated: true,
            ..Self::empty(platform)
        }
    }

    pub fn failed(platform: Platform, kind: AuthErrorKind, details: impl Into<String>) -> Self {
        Self {
            error: Some(kind),
            error_details: Some(details.into()),
            ..Self::empty(platform)
        }
    }

    /// Authenticated and carrying at least one cookie
    pub fn is_usable(&self) -> bool {
        self.is_authenticated && !self.cookies.is_empty()
    }

    pub fn is_older_than(&self, max_age: Duration) -> bool {
        Utc::now() - self.obtained_at > max_age
    }

    /// Value for a `Cookie` request header
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Lifecycle of one platform's session inside the store
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    NotAttempted,
    Authenticating,
    Authenticated(AuthSession),
    Failed(AuthSession),
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::NotAttempted => "not-attempted",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Failed(_) => "failed",
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            SessionState::Authenticated(s) | SessionState::Failed(s) => Some(s),
            _ => None,
        }
    }
}
