//! Mailbox access over the Microsoft Graph REST API.

pub mod auth;
pub mod client;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod retry;
pub mod types;

use std::sync::LazyLock;

use regex::Regex;

pub use auth::{
    token_provider_from_config, ClientCredentialsProvider, StaticTokenProvider, TokenProvider,
};
pub use client::{GraphClient, MailboxApi};
pub use downloader::{AttachmentDownloader, AttachmentFilter, SkipReason};
pub use error::MailboxError;
pub use fetcher::MessageFetcher;
pub use retry::{RecordingSleeper, RetryEvent, RetryPolicy, RetryState, Sleeper, TokioSleeper};
pub use types::{AttachmentRef, DownloadedAttachment, EmailMessage, MessagePage};

static RE_USER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/users/([^/?#]+)/messages").unwrap());

/// The mailbox owner named in a message-list URL.
pub fn user_from_endpoint(endpoint: &str) -> Option<String> {
    RE_USER
        .captures(endpoint)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|u| !u.is_empty())
}

/// Whether the listing only asks for unread messages.
pub fn has_unread_filter(endpoint: &str) -> bool {
    let decoded = endpoint
        .replace("%20", " ")
        .replace('+', " ")
        .to_ascii_lowercase();
    decoded.contains("isread eq false")
}

/// Everything before `/users/`, e.g. `https://graph.microsoft.com/v1.0`.
pub fn base_url_from_endpoint(endpoint: &str) -> Option<String> {
    endpoint
        .find("/users/")
        .map(|idx| endpoint[..idx].to_string())
        .filter(|base| base.starts_with("http"))
}
