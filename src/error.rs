// src/error.rs
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::types::{AuthErrorKind, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthFailure {
    ChallengeDetected,
    Timeout,
    Rejected,
}

impl From<AuthFailure> for AuthErrorKind {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::ChallengeDetected => AuthErrorKind::ChallengeDetected,
            AuthFailure::Timeout => AuthErrorKind::Timeout,
            AuthFailure::Rejected => AuthErrorKind::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkFailure {
    Timeout,
    ConnectionRefused,
    Status(u16),
    Other,
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkFailure::Timeout => f.write_str("timeout"),
            NetworkFailure::ConnectionRefused => f.write_str("connection refused"),
            NetworkFailure::Status(code) => write!(f, "HTTP {}", code),
            NetworkFailure::Other => f.write_str("request failed"),
        }
    }
}

/// Library error taxonomy
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Authentication failed for {platform} ({kind:?}): {message}")]
    Authentication {
        platform: Platform,
        kind: AuthFailure,
        message: String,
    },

    #[error("Network error for {platform}: {kind}: {message}")]
    Network {
        platform: Platform,
        kind: NetworkFailure,
        message: String,
    },

    #[error("Parse error for {platform}: {message}")]
    Parse { platform: Platform, message: String },

    #[error("Blocked by {platform} anti-automation defense: {marker}")]
    Blocked { platform: Platform, marker: String },

    #[error("{platform} requires an authenticated session")]
    SessionRequired { platform: Platform },

    #[error("No jobs found: {0}")]
    NoJobsFound(AggregationReport),
}

impl ScoutError {
    pub fn parse(platform: Platform, message: impl Into<String>) -> Self {
        ScoutError::Parse {
            platform,
            message: message.into(),
        }
    }

    /// Classify a reqwest failure into the network taxonomy
    pub fn from_reqwest(platform: Platform, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            NetworkFailure::Timeout
        } else if err.is_connect() {
            NetworkFailure::ConnectionRefused
        } else if let Some(status) = err.status() {
            NetworkFailure::Status(status.as_u16())
        } else {
            NetworkFailure::Other
        };
        ScoutError::Network {
            platform,
            kind,
            message: err.to_string(),
        }
    }

    /// Failures worth another attempt under the retry policy
    pub fn is_transient(&self) -> bool {
        match self {
            ScoutError::Network { kind, .. } => match kind {
                NetworkFailure::Timeout | NetworkFailure::ConnectionRefused => true,
                NetworkFailure::Status(code) => *code == 429 || *code >= 500,
                NetworkFailure::Other => false,
            },
            _ => false,
        }
    }

    /// Short machine-readable label used in reports
    pub fn kind_label(&self) -> &'static str {
        match self {
            ScoutError::Authentication { kind, .. } => match kind {
                AuthFailure::ChallengeDetected => "challenge-detected",
                AuthFailure::Timeout => "auth-timeout",
                AuthFailure::Rejected => "auth-rejected",
            },
            ScoutError::Network { .. } => "network",
            ScoutError::Parse { .. } => "parse",
            ScoutError::Blocked { .. } => "blocked",
            ScoutError::SessionRequired { .. } => "session-required",
            ScoutError::NoJobsFound(_) => "no-jobs-found",
        }
    }
}

// ===== Aggregation report =====

/// What one driver produced during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformOutcome {
    pub platform: Platform,
    pub job_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
}

impl PlatformOutcome {
    /// Why this platform yielded nothing, if it did
    pub fn reason(&self) -> String {
        match (&self.failure, self.job_count) {
            (Some(failure), _) => failure.clone(),
            (None, 0) => "returned no listings".to_string(),
            (None, n) => format!("returned {} listings", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AggregationReport {
    pub run_id: String,
    pub outcomes: Vec<PlatformOutcome>,
}

impl AggregationReport {
    pub fn attempted(&self) -> Vec<Platform> {
        self.outcomes.iter().map(|o| o.platform).collect()
    }

    pub fn total_jobs(&self) -> usize {
        self.outcomes.iter().map(|o| o.job_count).sum()
    }
}

impl fmt::Display for AggregationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outcomes.is_empty() {
            return f.write_str("no platforms were attempted");
        }
        let parts: Vec<String> = self
            .outcomes
            .iter()
            .map(|o| format!("{}: {}", o.platform, o.reason()))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}
