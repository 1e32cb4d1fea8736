// src/session/recorded.rs
//! Previously captured sessions stored as `<dir>/<platform>.json`

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::types::{AuthSession, Platform};

#[derive(Debug, Clone)]
pub struct RecordedSessions {
    dir: PathBuf,
}

impl RecordedSessions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, platform: Platform) -> PathBuf {
        self.dir.join(format!("{}.json", platform))
    }

    pub async fn exists(&self, platform: Platform) -> bool {
        fs::metadata(self.path_for(platform)).await.is_ok()
    }

    /// Load a captured session; `Ok(None)` when nothing was recorded
    pub async fn load(&self, platform: Platform) -> Result<Option<AuthSession>> {
        let path = self.path_for(platform);
        if fs::metadata(&path).await.is_err() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read recorded session: {}", path.display()))?;
        let mut session: AuthSession = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse recorded session: {}", path.display()))?;

        if session.platform != platform {
            warn!(
                "Recorded session {} belongs to {}, ignoring",
                path.display(),
                session.platform
            );
            return Ok(None);
        }

        // A capture is only as good as its cookies
        session.is_authenticated = !session.cookies.is_empty();
        session.error = None;
        session.error_details = None;

        info!(
            %platform,
            "Loaded recorded session with {} cookies",
            session.cookies.len()
        );
        Ok(Some(session))
    }

    pub async fn save(&self, session: &AuthSession) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;

        let path = self.path_for(session.platform);
        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        info!(platform = %session.platform, "Saved session to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionCookie, DEFAULT_IDENTITY};

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordedSessions::new(dir.path());
        let session = AuthSession::authenticated(
            Platform::LinkedIn,
            vec![SessionCookie {
                name: "li_at".to_string(),
                value: "token".to_string(),
                domain: ".linkedin.com".to_string(),
            }],
            DEFAULT_IDENTITY,
        );

        store.save(&session).await.unwrap();
        assert!(store.exists(Platform::LinkedIn).await);

        let loaded = store.load(Platform::LinkedIn).await.unwrap().unwrap();
        assert!(loaded.is_authenticated);
        assert_eq!(loaded.cookies, session.cookies);
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordedSessions::new(dir.path());
        assert!(store.load(Platform::Upwork).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capture_without_cookies_is_not_authenticated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("indeed.json"),
            r#"{"platform": "indeed", "identity_string": "Mozilla/5.0", "is_authenticated": true}"#,
        )
        .unwrap();
        let store = RecordedSessions::new(dir.path());
        let loaded = store.load(Platform::Indeed).await.unwrap().unwrap();
        assert!(!loaded.is_authenticated);
        assert_eq!(loaded.identity_string, "Mozilla/5.0");
    }

    #[tokio::test]
    async fn test_mismatched_platform_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("upwork.json"),
            r#"{"platform": "indeed", "cookies": [{"name": "a", "value": "b", "domain": "x"}]}"#,
        )
        .unwrap();
        let store = RecordedSessions::new(dir.path());
        assert!(store.load(Platform::Upwork).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("linkedin.json"), "{not json").unwrap();
        let store = RecordedSessions::new(dir.path());
        assert!(store.load(Platform::LinkedIn).await.is_err());
    }
}
