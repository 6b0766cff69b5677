//! Bearer tokens for the mail service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::{AuthConfig, FetchConfig};

use super::error::{MailboxError, Result};

/// Tokens are renewed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Maximum length for error response bodies kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<SecretString>;
}

/// A token handed to us by the operator. It is never refreshed.
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<SecretString> {
        Ok(copy_secret(&self.token))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// OAuth2 client-credentials grant against `{authority}/oauth2/v2.0/token`.
pub struct ClientCredentialsProvider {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    scope: String,
    cached: tokio::sync::Mutex<Option<CachedToken>>,
}

impl ClientCredentialsProvider {
    pub fn new(
        http: Client,
        authority: &str,
        client_id: impl Into<String>,
        client_secret: SecretString,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url(authority),
            client_id: client_id.into(),
            client_secret,
            scope: scope.into(),
            cached: tokio::sync::Mutex::new(None),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn request_token(&self) -> Result<CachedToken> {
        debug!("Requesting client-credentials token");
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| MailboxError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailboxError::Auth(format!(
                "Token endpoint returned {}: {}",
                status,
                sanitize_error_body(&body)
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| MailboxError::Auth(format!("Failed to parse token response: {}", e)))?;

        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(3600));
        info!("Obtained access token valid for {}s", lifetime.as_secs());

        Ok(CachedToken {
            token: SecretString::from(parsed.access_token),
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn token(&self) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if !needs_refresh(current.expires_at, Instant::now()) {
                return Ok(copy_secret(&current.token));
            }
        }

        let fresh = self.request_token().await?;
        let token = copy_secret(&fresh.token);
        *cached = Some(fresh);
        Ok(token)
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

fn needs_refresh(expires_at: Instant, now: Instant) -> bool {
    now + REFRESH_MARGIN >= expires_at
}

fn token_url(authority: &str) -> String {
    format!("{}/oauth2/v2.0/token", authority.trim_end_matches('/'))
}

/// Token endpoints sometimes echo request details back; keep only a prefix.
fn sanitize_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

pub(crate) fn create_http_client(fetch: &FetchConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
        .timeout(Duration::from_secs(fetch.request_timeout_secs))
        .build()
        .map_err(|e| MailboxError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Resolves the configured secrets and builds the matching provider.
pub fn token_provider_from_config(
    auth: &AuthConfig,
    fetch: &FetchConfig,
) -> std::result::Result<Arc<dyn TokenProvider>, crate::error::TriageError> {
    let provider: Arc<dyn TokenProvider> = match auth {
        AuthConfig::Token { token } => {
            Arc::new(StaticTokenProvider::new(token.resolve("mailbox.auth.token")?))
        }
        AuthConfig::ClientCredentials {
            authority,
            client_id,
            client_secret,
            scope,
        } => {
            let secret = client_secret.resolve("mailbox.auth.client_secret")?;
            Arc::new(ClientCredentialsProvider::new(
                create_http_client(fetch)?,
                authority,
                client_id.clone(),
                secret,
                scope.clone(),
            ))
        }
    };
    Ok(provider)
}
