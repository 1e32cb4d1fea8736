// src/session/store.rs
//! Answers "is platform P ready to scrape, and with what session?"

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::login::Authenticator;
use super::provider::{LoginProvider, RecordedProvider, SessionProvider};
use super::recorded::RecordedSessions;
use crate::credentials::{CredentialSource, Credentials};
use crate::types::{AuthErrorKind, AuthSession, Platform, SessionState};

struct Slot {
    state: Mutex<SessionState>,
    // Serialises login attempts for one platform
    auth_guard: tokio::sync::Mutex<()>,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::NotAttempted),
            auth_guard: tokio::sync::Mutex::new(()),
        }
    }
}

pub struct SessionStore {
    slots: HashMap<Platform, Slot>,
    credentials: Arc<dyn CredentialSource>,
    authenticator: Arc<dyn Authenticator>,
    recorded: RecordedSessions,
    providers: Vec<Arc<dyn SessionProvider>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    /// Provider chain: automated login first, recorded session as the fallback channel
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        authenticator: Arc<dyn Authenticator>,
        recorded: RecordedSessions,
        ttl: chrono::Duration,
    ) -> Self {
        let providers: Vec<Arc<dyn SessionProvider>> = vec![
            Arc::new(LoginProvider::new(credentials.clone(), authenticator.clone())),
            Arc::new(RecordedProvider::new(recorded.clone())),
        ];
        Self {
            slots: Platform::ALL.iter().map(|p| (*p, Slot::new())).collect(),
            credentials,
            authenticator,
            recorded,
            providers,
            ttl,
        }
    }

    pub fn with_providers(mut self, providers: Vec<Arc<dyn SessionProvider>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn recorded(&self) -> &RecordedSessions {
        &self.recorded
    }

    fn slot(&self, platform: Platform) -> &Slot {
        // every platform gets a slot in `new`
        &self.slots[&platform]
    }

    fn set_state(&self, platform: Platform, state: SessionState) {
        debug!(%platform, "Session state -> {}", state.label());
        *self
            .slot(platform)
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn record(&self, platform: Platform, session: &AuthSession) {
        let state = if session.is_authenticated {
            SessionState::Authenticated(session.clone())
        } else {
            SessionState::Failed(session.clone())
        };
        self.set_state(platform, state);
    }

    pub fn state(&self, platform: Platform) -> SessionState {
        self.slot(platform)
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Authenticated session that is still within its TTL
    fn cached(&self, platform: Platform) -> Option<AuthSession> {
        match self.state(platform) {
            SessionState::Authenticated(session) if !session.is_older_than(self.ttl) => Some(session),
            SessionState::Authenticated(_) => {
                info!(%platform, "Cached session expired, revalidating");
                self.set_state(platform, SessionState::NotAttempted);
                None
            }
            _ => None,
        }
    }

    /// True iff the minimum identity fields are configured for the platform
    pub fn check_credentials(&self, platform: Platform) -> bool {
        self.credentials.has_credentials(platform)
    }

    /// Automated login with the configured credentials
    pub async fn authenticate(&self, platform: Platform) -> AuthSession {
        if let Some(session) = self.cached(platform) {
            return session;
        }
        match self.credentials.credentials(platform).filter(|c| c.is_complete()) {
            Some(credentials) => self.authenticate_with(platform, &credentials).await,
            None => {
                let session = AuthSession::failed(
                    platform,
                    AuthErrorKind::CredentialsMissing,
                    format!("no credentials configured for {}", platform),
                );
                self.record(platform, &session);
                session
            }
        }
    }

    /// Automated login; a cached authenticated session is returned without a network call
    pub async fn authenticate_with(&self, platform: Platform, credentials: &Credentials) -> AuthSession {
        let _guard = self.slot(platform).auth_guard.lock().await;
        if let Some(session) = self.cached(platform) {
            debug!(%platform, "Reusing authenticated session");
            return session;
        }

        self.set_state(platform, SessionState::Authenticating);
        let session = self.authenticator.login(platform, credentials).await;
        self.record(platform, &session);
        session
    }

    /// Load a previously captured session without running a login
    pub async fn load_recorded_session(&self, platform: Platform) -> Option<AuthSession> {
        match self.recorded.load(platform).await {
            Ok(Some(session)) => {
                if session.is_authenticated && self.cached(platform).is_none() {
                    self.record(platform, &session);
                }
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%platform, "Failed to load recorded session: {:#}", e);
                None
            }
        }
    }

    /// Cached session, else the first provider that yields an authenticated one
    pub async fn session_for(&self, platform: Platform) -> AuthSession {
        let _guard = self.slot(platform).auth_guard.lock().await;
        if let Some(session) = self.cached(platform) {
            return session;
        }

        self.set_state(platform, SessionState::Authenticating);
        let mut last_failure = None;
        for provider in &self.providers {
            let Some(session) = provider.provide(platform).await else {
                continue;
            };
            if session.is_authenticated {
                info!(%platform, "Session ready via {:?}", provider.kind());
                self.record(platform, &session);
                return session;
            }
            debug!(
                %platform,
                "{:?} provider failed: {}",
                provider.kind(),
                session.error_details.as_deref().unwrap_or("unknown")
            );
            last_failure = Some(session);
        }

        let session = last_failure.unwrap_or_else(|| {
            AuthSession::failed(
                platform,
                AuthErrorKind::CredentialsMissing,
                "no session provider could supply a session",
            )
        });
        self.record(platform, &session);
        session
    }

    /// Forget whatever is held so the next request authenticates again
    pub fn invalidate(&self, platform: Platform) {
        info!(%platform, "Session invalidated");
        self.set_state(platform, SessionState::NotAttempted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::session::login::parse_cookie_header;
    use crate::types::DEFAULT_IDENTITY;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLogin {
        calls: AtomicUsize,
        outcome: Option<AuthErrorKind>,
        age: chrono::Duration,
    }

    impl FakeLogin {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: None,
                age: chrono::Duration::zero(),
            }
        }

        fn failing(kind: AuthErrorKind) -> Self {
            Self {
                outcome: Some(kind),
                ..Self::succeeding()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for FakeLogin {
        async fn login(&self, platform: Platform, _credentials: &Credentials) -> AuthSession {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Some(kind) => AuthSession::failed(platform, kind, "fake failure"),
                None => {
                    let mut session = AuthSession::authenticated(
                        platform,
                        parse_cookie_header("li_at=fresh", ".linkedin.com"),
                        DEFAULT_IDENTITY,
                    );
                    session.obtained_at = chrono::Utc::now() - self.age;
                    session
                }
            }
        }
    }

    fn credentials() -> Arc<StaticCredentials> {
        Arc::new(
            StaticCredentials::new()
                .with(Platform::LinkedIn, Credentials::new("qa@example.com", "pw")),
        )
    }

    fn store(login: Arc<FakeLogin>, dir: &std::path::Path) -> SessionStore {
        SessionStore::new(
            credentials(),
            login,
            RecordedSessions::new(dir),
            chrono::Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_reauthentication_reuses_cached_session() {
        let dir = tempfile::tempdir().unwrap();
        let login = Arc::new(FakeLogin::succeeding());
        let store = store(login.clone(), dir.path());

        assert_eq!(store.state(Platform::LinkedIn), SessionState::NotAttempted);
        let first = store.authenticate(Platform::LinkedIn).await;
        let second = store.authenticate(Platform::LinkedIn).await;

        assert!(first.is_usable());
        assert_eq!(first, second);
        assert_eq!(login.calls(), 1);
        assert_eq!(store.state(Platform::LinkedIn).label(), "authenticated");
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_login() {
        let dir = tempfile::tempdir().unwrap();
        let login = Arc::new(FakeLogin::succeeding());
        let store = store(login.clone(), dir.path());

        store.authenticate(Platform::LinkedIn).await;
        store.invalidate(Platform::LinkedIn);
        store.authenticate(Platform::LinkedIn).await;
        assert_eq!(login.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_session_is_revalidated() {
        let dir = tempfile::tempdir().unwrap();
        let login = Arc::new(FakeLogin {
            age: chrono::Duration::hours(2),
            ..FakeLogin::succeeding()
        });
        let store = store(login.clone(), dir.path());

        store.authenticate(Platform::LinkedIn).await;
        store.authenticate(Platform::LinkedIn).await;
        assert_eq!(login.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_login() {
        let dir = tempfile::tempdir().unwrap();
        let login = Arc::new(FakeLogin::succeeding());
        let store = store(login.clone(), dir.path());

        assert!(!store.check_credentials(Platform::Upwork));
        assert!(store.check_credentials(Platform::LinkedIn));

        let session = store.authenticate(Platform::Upwork).await;
        assert!(!session.is_authenticated);
        assert_eq!(session.error, Some(AuthErrorKind::CredentialsMissing));
        assert_eq!(store.state(Platform::Upwork).label(), "failed");
        assert_eq!(login.calls(), 0);
    }

    #[tokio::test]
    async fn test_session_for_falls_back_to_recorded_session() {
        let dir = tempfile::tempdir().unwrap();
        let login = Arc::new(FakeLogin::failing(AuthErrorKind::ChallengeDetected));
        let store = store(login.clone(), dir.path());

        let recorded = AuthSession::authenticated(
            Platform::LinkedIn,
            parse_cookie_header("li_at=recorded", ".linkedin.com"),
            DEFAULT_IDENTITY,
        );
        store.recorded().save(&recorded).await.unwrap();

        let session = store.session_for(Platform::LinkedIn).await;
        assert!(session.is_usable());
        assert_eq!(session.cookies[0].value, "recorded");
        assert_eq!(login.calls(), 1);

        // cached now, no further provider calls
        store.session_for(Platform::LinkedIn).await;
        assert_eq!(login.calls(), 1);
    }

    #[tokio::test]
    async fn test_session_for_keeps_last_failure() {
        let dir = tempfile::tempdir().unwrap();
        let login = Arc::new(FakeLogin::failing(AuthErrorKind::ChallengeDetected));
        let store = store(login.clone(), dir.path());

        let session = store.session_for(Platform::LinkedIn).await;
        assert!(!session.is_authenticated);
        assert_eq!(session.error, Some(AuthErrorKind::ChallengeDetected));
        match store.state(Platform::LinkedIn) {
            SessionState::Failed(s) => assert_eq!(s.error, Some(AuthErrorKind::ChallengeDetected)),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_recorded_session_populates_state() {
        let dir = tempfile::tempdir().unwrap();
        let login = Arc::new(FakeLogin::succeeding());
        let store = store(login.clone(), dir.path());
        assert!(store.load_recorded_session(Platform::Indeed).await.is_none());

        let recorded = AuthSession::authenticated(
            Platform::Indeed,
            parse_cookie_header("SOCK=abc", ".indeed.com"),
            DEFAULT_IDENTITY,
        );
        store.recorded().save(&recorded).await.unwrap();

        let loaded = store.load_recorded_session(Platform::Indeed).await.unwrap();
        assert!(loaded.is_authenticated);
        assert_eq!(store.state(Platform::Indeed).label(), "authenticated");
        assert_eq!(login.calls(), 0);
    }
}
