// src/retry.rs
//! Bounded retry policy and fixed inter-request pacing

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ScoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: Backoff,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff: Backoff::Exponential,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff: Backoff::Fixed,
            jitter: false,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            max_attempts,
            base_delay_ms: ms,
            max_delay_ms: ms,
            backoff: Backoff::Fixed,
            jitter: false,
        }
    }

    /// Wait before retry number `retry` (1 = the wait after the first failure)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.base_delay_ms,
            Backoff::Exponential => {
                let factor = 2u64.saturating_pow(retry.saturating_sub(1));
                self.base_delay_ms.saturating_mul(factor)
            }
        };
        let capped = base.min(self.max_delay_ms.max(self.base_delay_ms));
        let jittered = if self.jitter && capped > 0 {
            capped + rand::thread_rng().gen_range(0..=capped / 2)
        } else {
            capped
        };
        Duration::from_millis(jittered)
    }

    /// Run `op` until it succeeds, `should_retry` rejects the error, or attempts run out.
    /// The last error is the typed terminal reason.
    pub async fn run_with<T, E, F, Fut, P>(&self, label: &str, should_retry: P, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && should_retry(&err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label, attempt, attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!("{} giving up after {} attempt(s)", label, attempt);
                    return Err(err);
                }
            }
        }
    }

    /// Retry transient network failures only
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T, ScoutError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ScoutError>>,
    {
        self.run_with(label, ScoutError::is_transient, op).await
    }
}

/// Keeps consecutive network operations at least `delay` apart
pub struct Pacer {
    delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            let now = Instant::now();
            if ready_at > now {
                debug!("Pacing next request by {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
