//! Mailbox error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the mail service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    /// Token acquisition failed or the service rejected our credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// HTTP 429. Never counts against the attempt budget.
    #[error("Rate limited by the mail service")]
    RateLimited { retry_after: Option<Duration> },

    /// Timeouts, connection resets, 408 and 5xx responses.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Any other non-success status.
    #[error("Request failed with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The transient retry budget ran out.
    #[error("Giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Could not build the HTTP client.
    #[error("Invalid mailbox configuration: {0}")]
    Config(String),
}

impl MailboxError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, MailboxError>;
