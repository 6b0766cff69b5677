//! HTTP access to the Microsoft Graph mail endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use log::{debug, warn};
use reqwest::{Client, Response, StatusCode};
use secrecy::ExposeSecret;

use crate::config::{FetchConfig, MailboxConfig};

use super::auth::{create_http_client, TokenProvider};
use super::error::{MailboxError, Result};
use super::types::{parse_attachment_list, parse_message_page, AttachmentRef, MessagePage};

const MAX_ERROR_BODY_LENGTH: usize = 200;

/// One request per call; retrying is the caller's business.
#[async_trait]
pub trait MailboxApi: Send + Sync {
    /// Fetches one listing page. `url` is the configured endpoint or a
    /// `@odata.nextLink` from the previous page.
    async fn list_page(&self, url: &str) -> Result<MessagePage>;

    async fn list_attachments(&self, message_id: &str) -> Result<Vec<AttachmentRef>>;

    /// Raw bytes of one file attachment.
    async fn download_attachment(
        &self,
        message_id: &str,
        attachment: &AttachmentRef,
    ) -> Result<Vec<u8>>;

    async fn mark_read(&self, message_id: &str) -> Result<()>;
}

pub struct GraphClient {
    http: Client,
    base_url: String,
    user: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GraphClient {
    pub fn new(
        mailbox: &MailboxConfig,
        fetch: &FetchConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let user = super::user_from_endpoint(&mailbox.endpoint).ok_or_else(|| {
            MailboxError::Config(format!(
                "Cannot find the mailbox user in endpoint '{}'",
                mailbox.endpoint
            ))
        })?;
        let base_url = mailbox
            .base_url
            .clone()
            .or_else(|| super::base_url_from_endpoint(&mailbox.endpoint))
            .ok_or_else(|| MailboxError::Config("Cannot derive the API base URL".to_string()))?;

        Ok(Self {
            http: create_http_client(fetch)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
            tokens,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn message_url(&self, message_id: &str) -> String {
        format!("{}/users/{}/messages/{}", self.base_url, self.user, message_id)
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(MailboxError::from_reqwest)?;
        check_status(response).await
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(MailboxError::from_reqwest)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl MailboxApi for GraphClient {
    async fn list_page(&self, url: &str) -> Result<MessagePage> {
        debug!("GET message page");
        let body = self.get_bytes(url).await?;
        parse_message_page(&body).map_err(|e| MailboxError::InvalidResponse(e.to_string()))
    }

    async fn list_attachments(&self, message_id: &str) -> Result<Vec<AttachmentRef>> {
        let url = format!("{}/attachments", self.message_url(message_id));
        let body = self.get_bytes(&url).await?;
        parse_attachment_list(&body).map_err(|e| MailboxError::InvalidResponse(e.to_string()))
    }

    async fn download_attachment(
        &self,
        message_id: &str,
        attachment: &AttachmentRef,
    ) -> Result<Vec<u8>> {
        if let Some(inline) = attachment.content_bytes.as_deref() {
            return Ok(decode_content_bytes(inline));
        }

        let url = format!(
            "{}/attachments/{}",
            self.message_url(message_id),
            attachment.id
        );
        let body = self.get_bytes(&url).await?;
        let full: AttachmentRef = serde_json::from_slice(&body)
            .map_err(|e| MailboxError::InvalidResponse(e.to_string()))?;

        match full.content_bytes {
            Some(content) => Ok(decode_content_bytes(&content)),
            None => {
                debug!("Attachment {} has no contentBytes, fetching $value", attachment.id);
                self.get_bytes(&format!("{}/$value", url)).await
            }
        }
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .patch(self.message_url(message_id))
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({ "isRead": true }))
            .send()
            .await
            .map_err(MailboxError::from_reqwest)?;
        check_status(response).await.map(|_| ())
    }
}

/// `contentBytes` is base64; some gateways hand back the raw text instead.
pub(crate) fn decode_content_bytes(content: &str) -> Vec<u8> {
    match base64::engine::general_purpose::STANDARD.decode(content.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("contentBytes is not valid base64 ({}), using it verbatim", e);
            content.as_bytes().to_vec()
        }
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(&response);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after, &body))
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> MailboxError {
    let body = truncate(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => MailboxError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            MailboxError::Auth(format!("HTTP {}: {}", status.as_u16(), body))
        }
        StatusCode::REQUEST_TIMEOUT => MailboxError::Transient(format!("HTTP 408: {}", body)),
        s if s.is_server_error() => {
            MailboxError::Transient(format!("HTTP {}: {}", s.as_u16(), body))
        }
        s => MailboxError::Http {
            status: s.as_u16(),
            body,
        },
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((end, _)) => format!("{}... (truncated)", &body[..end]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(7)), ""),
            MailboxError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
        assert!(classify_status(StatusCode::UNAUTHORIZED, None, "").is_auth());
        assert!(classify_status(StatusCode::FORBIDDEN, None, "").is_auth());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, None, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, None, "").is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, None, "").is_transient());
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, None, "gone"),
            MailboxError::Http {
                status: 404,
                body: "gone".to_string()
            }
        );
    }

    #[test]
    fn test_long_bodies_truncated() {
        let err = classify_status(StatusCode::BAD_REQUEST, None, &"x".repeat(1000));
        match err {
            MailboxError::Http { body, .. } => assert!(body.len() < 250),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_content_bytes() {
        assert_eq!(decode_content_bytes("JVBERi0xLjQ="), b"%PDF-1.4");
        assert_eq!(decode_content_bytes("not base64!"), b"not base64!");
    }

    #[test]
    fn test_client_from_config() {
        use crate::config::AuthConfig;
        use crate::mailbox::auth::StaticTokenProvider;

        let mailbox = MailboxConfig {
            endpoint: "https://graph.microsoft.com/v1.0/users/rh@example.com/messages?$top=50"
                .to_string(),
            base_url: None,
            auth: AuthConfig::Token {
                token: Default::default(),
            },
            mark_as_read: true,
        };
        let tokens = Arc::new(StaticTokenProvider::new(secrecy::SecretString::from("t".to_string())));
        let client = GraphClient::new(&mailbox, &FetchConfig::default(), tokens).unwrap();

        assert_eq!(client.user(), "rh@example.com");
        assert_eq!(
            client.message_url("abc"),
            "https://graph.microsoft.com/v1.0/users/rh@example.com/messages/abc"
        );
    }
}
