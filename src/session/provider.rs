// src/session/provider.rs
//! The ways a platform session can be obtained, behind one interface

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::login::Authenticator;
use super::recorded::RecordedSessions;
use crate::credentials::CredentialSource;
use crate::types::{AuthErrorKind, AuthSession, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    AutomatedLogin,
    /// Cookies captured from a manually operated browser and saved to disk
    Recorded,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// `None` when this provider has nothing to offer for the platform,
    /// otherwise the (possibly failed) attempt
    async fn provide(&self, platform: Platform) -> Option<AuthSession>;
}

pub struct LoginProvider {
    credentials: Arc<dyn CredentialSource>,
    authenticator: Arc<dyn Authenticator>,
}

impl LoginProvider {
    pub fn new(credentials: Arc<dyn CredentialSource>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            credentials,
            authenticator,
        }
    }
}

#[async_trait]
impl SessionProvider for LoginProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AutomatedLogin
    }

    async fn provide(&self, platform: Platform) -> Option<AuthSession> {
        let credentials = self.credentials.credentials(platform).filter(|c| c.is_complete());
        match credentials {
            Some(credentials) => Some(self.authenticator.login(platform, &credentials).await),
            None => Some(AuthSession::failed(
                platform,
                AuthErrorKind::CredentialsMissing,
                format!(
                    "set {0}_EMAIL and {0}_PASSWORD to enable login",
                    platform.env_prefix()
                ),
            )),
        }
    }
}

pub struct RecordedProvider {
    recorded: RecordedSessions,
}

impl RecordedProvider {
    pub fn new(recorded: RecordedSessions) -> Self {
        Self { recorded }
    }
}

#[async_trait]
impl SessionProvider for RecordedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Recorded
    }

    async fn provide(&self, platform: Platform) -> Option<AuthSession> {
        match self.recorded.load(platform).await {
            Ok(session) => session,
            Err(e) => {
                warn!(%platform, "Recorded session unusable: {:#}", e);
                Some(AuthSession::failed(
                    platform,
                    AuthErrorKind::Rejected,
                    format!("recorded session unusable: {:#}", e),
                ))
            }
        }
    }
}
