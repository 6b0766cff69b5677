//! Retry state machine shared by every mailbox request.
//!
//! ```text
//! Attempt(n) --ok--------------------------> Success
//! Attempt(n) --429-------------------------> RateLimited(n, wait) --> Attempt(n)
//! Attempt(n) --transient, n < max----------> Backoff(n, wait) ------> Attempt(n + 1)
//! Attempt(n) --transient, n = max | other--> Fatal
//! ```
//!
//! Waiting goes through [`Sleeper`] so tests never sleep for real.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::config::FetchConfig;

use super::error::{MailboxError, Result};

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested waits and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to make attempt `n` (1-based).
    Attempt(u32),
    RateLimited { attempt: u32, wait: Duration },
    Backoff { attempt: u32, wait: Duration },
    Success,
    Fatal,
}

#[derive(Debug, Clone, Copy)]
pub enum RetryEvent<'a> {
    Succeeded,
    Failed(&'a MailboxError),
    Waited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub default_retry_after: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            default_retry_after: Duration::from_secs(config.default_retry_after_secs),
            backoff_cap: Duration::from_secs(config.backoff_cap_secs),
        }
    }

    /// `2^attempt` seconds, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.backoff_cap)
    }

    pub fn transition(&self, state: RetryState, event: RetryEvent<'_>) -> RetryState {
        match (state, event) {
            (RetryState::Attempt(_), RetryEvent::Succeeded) => RetryState::Success,
            (RetryState::Attempt(n), RetryEvent::Failed(err)) => match err {
                MailboxError::RateLimited { retry_after } => RetryState::RateLimited {
                    attempt: n,
                    wait: retry_after.unwrap_or(self.default_retry_after),
                },
                MailboxError::Transient(_) if n < self.max_attempts => RetryState::Backoff {
                    attempt: n,
                    wait: self.backoff(n),
                },
                _ => RetryState::Fatal,
            },
            (RetryState::RateLimited { attempt, .. }, RetryEvent::Waited) => {
                RetryState::Attempt(attempt)
            }
            (RetryState::Backoff { attempt, .. }, RetryEvent::Waited) => {
                RetryState::Attempt(attempt + 1)
            }
            (other, _) => other,
        }
    }

    /// Drives `op` through the state machine until it succeeds or fails for
    /// good. An exhausted transient budget becomes
    /// [`MailboxError::RetriesExhausted`]; other fatal errors pass through.
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let waiting = match self.transition(RetryState::Attempt(attempt), RetryEvent::Failed(&err)) {
                waiting @ RetryState::RateLimited { wait, .. } => {
                    warn!("{}: rate limited, waiting {}s", label, wait.as_secs());
                    waiting
                }
                waiting @ RetryState::Backoff { wait, .. } => {
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {}s",
                        label,
                        attempt,
                        self.max_attempts,
                        err,
                        wait.as_secs()
                    );
                    waiting
                }
                _ if err.is_transient() => {
                    return Err(MailboxError::RetriesExhausted {
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }
                _ => {
                    debug!("{}: giving up on non-retryable error", label);
                    return Err(err);
                }
            };

            if let RetryState::RateLimited { wait, .. } | RetryState::Backoff { wait, .. } = waiting {
                sleeper.sleep(wait).await;
            }
            if let RetryState::Attempt(next) = self.transition(waiting, RetryEvent::Waited) {
                attempt = next;
            }
        }
    }
}
