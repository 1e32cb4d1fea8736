// src/session/login.rs
//! Automated form login for platforms that support it

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use url::Url;

use super::challenge::{detect_challenge, ChallengeResolver};
use crate::config::HttpSettings;
use crate::credentials::Credentials;
use crate::error::{AuthFailure, ScoutError};
use crate::retry::{Pacer, RetryPolicy};
use crate::types::{AuthErrorKind, AuthSession, Platform, SessionCookie};

/// Static description of one platform's login form
#[derive(Debug, Clone, PartialEq)]
pub struct LoginFlow {
    pub platform: Platform,
    pub login_page: &'static str,
    pub submit_url: &'static str,
    pub user_field: &'static str,
    pub password_field: &'static str,
    /// Cookie whose presence proves the login went through
    pub session_cookie: &'static str,
    pub cookie_domain: &'static str,
    pub rejected_markers: &'static [&'static str],
}

impl LoginFlow {
    pub fn for_platform(platform: Platform) -> Option<Self> {
        match platform {
            Platform::LinkedIn => Some(LoginFlow {
                platform,
                login_page: "https://www.linkedin.com/login",
                submit_url: "https://www.linkedin.com/checkpoint/lg/login-submit",
                user_field: "session_key",
                password_field: "session_password",
                session_cookie: "li_at",
                cookie_domain: ".linkedin.com",
                rejected_markers: &[
                    "wrong email or password",
                    "that's not the right password",
                    "couldn't find a linkedin account",
                ],
            }),
            Platform::Indeed => Some(LoginFlow {
                platform,
                login_page: "https://secure.indeed.com/account/login",
                submit_url: "https://secure.indeed.com/account/login",
                user_field: "__email",
                password_field: "__password",
                session_cookie: "SOCK",
                cookie_domain: ".indeed.com",
                rejected_markers: &["invalid email address or password", "incorrect password"],
            }),
            Platform::Upwork => Some(LoginFlow {
                platform,
                login_page: "https://www.upwork.com/ab/account-security/login",
                submit_url: "https://www.upwork.com/ab/account-security/login",
                user_field: "login[username]",
                password_field: "login[password]",
                session_cookie: "master_access_token",
                cookie_domain: ".upwork.com",
                rejected_markers: &["username or password is incorrect", "oops! password is incorrect"],
            }),
            Platform::Freelancer | Platform::Remotive | Platform::RemoteOk => None,
        }
    }

    fn cookie_origin(&self) -> String {
        format!("https://www{}", self.cookie_domain)
    }
}

/// Hidden inputs (CSRF tokens and the like) of the form holding the password field
pub fn hidden_fields(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let (Ok(form_selector), Ok(hidden_selector), Ok(password_selector)) = (
        Selector::parse("form"),
        Selector::parse("input[type='hidden']"),
        Selector::parse("input[type='password']"),
    ) else {
        return Vec::new();
    };

    let form = document
        .select(&form_selector)
        .find(|form| form.select(&password_selector).next().is_some())
        .or_else(|| document.select(&form_selector).next());

    form.map(|form| {
        form.select(&hidden_selector)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or_default();
                Some((name.to_string(), value.to_string()))
            })
            .collect()
    })
    .unwrap_or_default()
}

/// Split a `name=value; name2=value2` header into session cookies
pub fn parse_cookie_header(header: &str, domain: &str) -> Vec<SessionCookie> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            if name.is_empty() {
                return None;
            }
            Some(SessionCookie {
                name: name.to_string(),
                value: value.to_string(),
                domain: domain.to_string(),
            })
        })
        .collect()
}

/// Decide what a login submission produced
pub fn classify_submission(
    flow: &LoginFlow,
    final_url: &str,
    body: &str,
    cookies: Vec<SessionCookie>,
) -> Result<Vec<SessionCookie>, ScoutError> {
    let marker = detect_challenge(body).or_else(|| {
        final_url
            .contains("checkpoint/challenge")
            .then_some("checkpoint/challenge")
    });
    if let Some(marker) = marker {
        return Err(ScoutError::Authentication {
            platform: flow.platform,
            kind: AuthFailure::ChallengeDetected,
            message: format!("challenge page after login ({})", marker),
        });
    }

    if cookies.iter().any(|c| c.name == flow.session_cookie) {
        return Ok(cookies);
    }

    let lower = body.to_lowercase();
    let reason = flow
        .rejected_markers
        .iter()
        .find(|m| lower.contains(*m))
        .map(|m| format!("login rejected: {}", m))
        .unwrap_or_else(|| format!("no {} cookie issued", flow.session_cookie));

    Err(ScoutError::Authentication {
        platform: flow.platform,
        kind: AuthFailure::Rejected,
        message: reason,
    })
}

/// Turns credentials into a session
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, platform: Platform, credentials: &Credentials) -> AuthSession;
}

pub struct AutomatedLogin {
    http: HttpSettings,
    retry: RetryPolicy,
    pacer: Arc<Pacer>,
    resolver: Arc<dyn ChallengeResolver>,
}

impl AutomatedLogin {
    pub fn new(
        http: HttpSettings,
        retry: RetryPolicy,
        pacer: Arc<Pacer>,
        resolver: Arc<dyn ChallengeResolver>,
    ) -> Self {
        Self {
            http,
            retry,
            pacer,
            resolver,
        }
    }

    fn request_error(platform: Platform, err: reqwest::Error) -> ScoutError {
        if err.is_timeout() {
            ScoutError::Authentication {
                platform,
                kind: AuthFailure::Timeout,
                message: err.to_string(),
            }
        } else {
            ScoutError::from_reqwest(platform, err)
        }
    }

    async fn attempt(
        &self,
        flow: &LoginFlow,
        credentials: &Credentials,
        pending_challenge: &Mutex<Option<String>>,
    ) -> Result<AuthSession, ScoutError> {
        let platform = flow.platform;

        let pending = pending_challenge
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(marker) = pending {
            if !self.resolver.resolve(platform, &marker, flow.login_page).await {
                return Err(ScoutError::Authentication {
                    platform,
                    kind: AuthFailure::Timeout,
                    message: format!("challenge not resolved ({})", marker),
                });
            }
        }

        let result = self.submit(flow, credentials).await;
        if let Err(ScoutError::Authentication {
            kind: AuthFailure::ChallengeDetected,
            message,
            ..
        }) = &result
        {
            *pending_challenge.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.clone());
        }
        result
    }

    async fn submit(&self, flow: &LoginFlow, credentials: &Credentials) -> Result<AuthSession, ScoutError> {
        let platform = flow.platform;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(&self.http.user_agent)
            .timeout(self.http.timeout())
            .build()
            .map_err(|e| ScoutError::from_reqwest(platform, e))?;

        self.pacer.wait().await;
        let page = client
            .get(flow.login_page)
            .send()
            .await
            .map_err(|e| Self::request_error(platform, e))?;
        let page_body = page
            .text()
            .await
            .map_err(|e| Self::request_error(platform, e))?;

        if let Some(marker) = detect_challenge(&page_body) {
            return Err(ScoutError::Authentication {
                platform,
                kind: AuthFailure::ChallengeDetected,
                message: format!("challenge on login page ({})", marker),
            });
        }

        let mut form = hidden_fields(&page_body);
        form.push((flow.user_field.to_string(), credentials.login_id().to_string()));
        form.push((flow.password_field.to_string(), credentials.password.clone()));

        self.pacer.wait().await;
        let response = client
            .post(flow.submit_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Self::request_error(platform, e))?;
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| Self::request_error(platform, e))?;

        let origin = Url::parse(&flow.cookie_origin())
            .map_err(|e| ScoutError::parse(platform, format!("bad cookie origin: {}", e)))?;
        let cookies = jar
            .cookies(&origin)
            .and_then(|header| header.to_str().ok().map(str::to_string))
            .map(|header| parse_cookie_header(&header, flow.cookie_domain))
            .unwrap_or_default();

        let cookies = classify_submission(flow, &final_url, &body, cookies)?;
        Ok(AuthSession::authenticated(platform, cookies, &self.http.user_agent))
    }
}

#[async_trait]
impl Authenticator for AutomatedLogin {
    async fn login(&self, platform: Platform, credentials: &Credentials) -> AuthSession {
        let Some(flow) = LoginFlow::for_platform(platform) else {
            return AuthSession::failed(
                platform,
                AuthErrorKind::Unsupported,
                format!("{} has no automated login flow", platform),
            );
        };
        if !credentials.is_complete() {
            return AuthSession::failed(
                platform,
                AuthErrorKind::CredentialsMissing,
                "email and password are required",
            );
        }

        info!(%platform, "Attempting automated login");
        let pending_challenge = Mutex::new(None);
        let interactive = self.resolver.is_interactive();
        let label = format!("{} login", platform);

        let result = self
            .retry
            .run_with(
                &label,
                |err: &ScoutError| {
                    err.is_transient()
                        || (interactive
                            && matches!(
                                err,
                                ScoutError::Authentication {
                                    kind: AuthFailure::ChallengeDetected,
                                    ..
                                }
                            ))
                },
                |_| self.attempt(&flow, credentials, &pending_challenge),
            )
            .await;

        match result {
            Ok(session) => {
                info!(%platform, "Login succeeded with {} cookies", session.cookies.len());
                session
            }
            Err(err) => {
                warn!(%platform, "Login failed: {}", err);
                let kind = match &err {
                    ScoutError::Authentication { kind, .. } => (*kind).into(),
                    _ => AuthErrorKind::Network,
                };
                AuthSession::failed(platform, kind, err.to_string())
            }
        }
    }
}
