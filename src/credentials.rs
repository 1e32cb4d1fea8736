// src/credentials.rs
use std::collections::HashMap;
use tracing::debug;

use crate::types::Platform;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            username: None,
        }
    }

    /// Minimum identity fields needed to attempt a login
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }

    /// Login identifier: the username when a platform uses one, else the email
    pub fn login_id(&self) -> &str {
        self.username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

// Keep passwords out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .field("username", &self.username)
            .finish()
    }
}

/// Where the core asks for login identities
pub trait CredentialSource: Send + Sync {
    fn credentials(&self, platform: Platform) -> Option<Credentials>;

    fn has_credentials(&self, platform: Platform) -> bool {
        self.credentials(platform)
            .map(|c| c.is_complete())
            .unwrap_or(false)
    }
}

/// Reads `JOBRADAR_<PLATFORM>_EMAIL` / `_PASSWORD` / `_USERNAME`, honouring a `.env` file
pub struct EnvCredentials;

impl EnvCredentials {
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(_) => debug!("No .env file found"),
        }
        Self
    }
}

impl CredentialSource for EnvCredentials {
    fn credentials(&self, platform: Platform) -> Option<Credentials> {
        let prefix = platform.env_prefix();
        let email = std::env::var(format!("{}_EMAIL", prefix)).ok()?;
        let password = std::env::var(format!("{}_PASSWORD", prefix)).ok()?;
        let username = std::env::var(format!("{}_USERNAME", prefix)).ok();
        Some(Credentials {
            email,
            password,
            username,
        })
    }
}

/// Fixed in-memory credentials, for embedding and tests
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    entries: HashMap<Platform, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, platform: Platform, credentials: Credentials) -> Self {
        self.entries.insert(platform, credentials);
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn credentials(&self, platform: Platform) -> Option<Credentials> {
        self.entries.get(&platform).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_credentials_do_not_count() {
        let source = StaticCredentials::new()
            .with(Platform::LinkedIn, Credentials::new("qa@example.com", "secret"))
            .with(Platform::Upwork, Credentials::new("qa@example.com", ""));
        assert!(source.has_credentials(Platform::LinkedIn));
        assert!(!source.has_credentials(Platform::Upwork));
        assert!(!source.has_credentials(Platform::Indeed));
    }

    #[test]
    fn test_login_id_prefers_username() {
        let mut creds = Credentials::new("qa@example.com", "secret");
        assert_eq!(creds.login_id(), "qa@example.com");
        creds.username = Some("qa_runner".to_string());
        assert_eq!(creds.login_id(), "qa_runner");
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("qa@example.com", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_env_credentials_read_platform_prefix() {
        std::env::set_var("JOBRADAR_FREELANCER_EMAIL", "me@example.com");
        std::env::set_var("JOBRADAR_FREELANCER_PASSWORD", "pw");
        std::env::set_var("JOBRADAR_FREELANCER_USERNAME", "me");
        let creds = EnvCredentials.credentials(Platform::Freelancer).unwrap();
        assert_eq!(creds.email, "me@example.com");
        assert_eq!(creds.username.as_deref(), Some("me"));
        assert!(EnvCredentials.has_credentials(Platform::Freelancer));
    }
}
