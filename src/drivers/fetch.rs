// src/drivers/fetch.rs
//! Outbound page/API fetching

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::HttpSettings;
use crate::error::{NetworkFailure, ScoutError};
use crate::types::{AuthSession, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Json,
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub platform: Platform,
    pub url: String,
    pub kind: ContentKind,
    /// Cookies and identity string to present, when a session is in play
    pub session: Option<AuthSession>,
}

impl PageRequest {
    pub fn new(platform: Platform, url: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            platform,
            url: url.into(),
            kind,
            session: None,
        }
    }

    pub fn with_session(mut self, session: Option<&AuthSession>) -> Self {
        self.session = session.cloned();
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, ScoutError>;
}

/// One client per driver invocation, carrying that invocation's cookies and identity.
/// Dropped on every exit path, which releases its connection pool.
pub struct PageClient {
    platform: Platform,
    client: Client,
}

impl PageClient {
    pub fn open(
        platform: Platform,
        kind: ContentKind,
        session: Option<&AuthSession>,
        http: &HttpSettings,
    ) -> Result<Self, ScoutError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(match kind {
                ContentKind::Html => "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
                ContentKind::Json => "application/json",
            }),
        );

        let mut identity = http.user_agent.clone();
        if let Some(session) = session {
            if let Some(cookie) = session.cookie_header() {
                match HeaderValue::from_str(&cookie) {
                    Ok(value) => {
                        headers.insert(COOKIE, value);
                    }
                    Err(e) => warn!(%platform, "Session cookies not sendable: {}", e),
                }
            }
            if !session.identity_string.trim().is_empty() {
                identity = session.identity_string.clone();
            }
        }

        let client = Client::builder()
            .user_agent(identity)
            .default_headers(headers)
            .timeout(http.timeout())
            .build()
            .map_err(|e| ScoutError::from_reqwest(platform, e))?;

        debug!(%platform, "Opened page client");
        Ok(Self { platform, client })
    }

    pub async fn get(&self, url: &str) -> Result<FetchedPage, ScoutError> {
        info!(platform = %self.platform, "Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScoutError::from_reqwest(self.platform, e))?;

        let status = response.status();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ScoutError::from_reqwest(self.platform, e))?;

        if status.as_u16() == 403 {
            return Err(ScoutError::Blocked {
                platform: self.platform,
                marker: "HTTP 403".to_string(),
            });
        }
        if !status.is_success() {
            return Err(ScoutError::Network {
                platform: self.platform,
                kind: NetworkFailure::Status(status.as_u16()),
                message: format!("{} returned {}", final_url, status),
            });
        }

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

impl Drop for PageClient {
    fn drop(&mut self) {
        debug!(platform = %self.platform, "Closed page client");
    }
}

pub struct HttpFetcher {
    http: HttpSettings,
}

impl HttpFetcher {
    pub fn new(http: HttpSettings) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, ScoutError> {
        let client = PageClient::open(
            request.platform,
            request.kind,
            request.session.as_ref(),
            &self.http,
        )?;
        client.get(&request.url).await
    }
}
