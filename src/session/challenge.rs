// src/session/challenge.rs
//! Anti-automation challenge detection and resolution

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::types::Platform;

/// Page fragments that only show up on CAPTCHA / human-verification / passkey interstitials
const CHALLENGE_MARKERS: &[&str] = &[
    "g-recaptcha",
    "h-captcha",
    "hcaptcha.com",
    "captcha-delivery",
    "cf-challenge",
    "challenge-platform",
    "just a moment...",
    "checking your browser",
    "prove you are human",
    "verify you are human",
    "are you a robot",
    "unusual activity from your",
    "security verification",
    "checkpoint/challenge",
    "let's do a quick security check",
    "use your passkey",
    "sign in with a passkey",
    "px-captcha",
];

/// First challenge marker found in `body`, case-insensitively
pub fn detect_challenge(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    CHALLENGE_MARKERS
        .iter()
        .copied()
        .find(|marker| lower.contains(marker))
}

/// Decides what happens when a login or page hits a challenge
#[async_trait]
pub trait ChallengeResolver: Send + Sync {
    /// Observable modes may pause; fail-fast modes never do
    fn is_interactive(&self) -> bool;

    /// Returns true once the challenge is believed resolved and a retry makes sense
    async fn resolve(&self, platform: Platform, marker: &str, url: &str) -> bool;
}

/// Headless runs: report the challenge and give up immediately
pub struct FailFast;

#[async_trait]
impl ChallengeResolver for FailFast {
    fn is_interactive(&self) -> bool {
        false
    }

    async fn resolve(&self, platform: Platform, marker: &str, _url: &str) -> bool {
        warn!(%platform, "Challenge detected ({}), failing fast", marker);
        false
    }
}

/// Observable runs: ask the operator to clear the challenge, then press Enter
pub struct ConsolePrompt {
    pub wait: Duration,
}

#[async_trait]
impl ChallengeResolver for ConsolePrompt {
    fn is_interactive(&self) -> bool {
        true
    }

    async fn resolve(&self, platform: Platform, marker: &str, url: &str) -> bool {
        eprintln!(
            "\n[{}] anti-automation challenge detected ({}).\n  Resolve it at {} and press Enter within {}s to retry.",
            platform,
            marker,
            url,
            self.wait.as_secs()
        );

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match tokio::time::timeout(self.wait, stdin.read_line(&mut line)).await {
            Ok(Ok(_)) => {
                info!(%platform, "Operator confirmed challenge resolution");
                true
            }
            Ok(Err(e)) => {
                warn!(%platform, "Could not read operator input: {}", e);
                false
            }
            Err(_) => {
                warn!(%platform, "Timed out waiting for challenge resolution");
                false
            }
        }
    }
}
