use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};

use super::client::MailboxApi;
use super::error::Result;
use super::retry::{RetryPolicy, Sleeper};
use super::types::EmailMessage;

/// Walks a message listing page by page, in server order.
pub struct MessageFetcher {
    api: Arc<dyn MailboxApi>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl MessageFetcher {
    pub fn new(api: Arc<dyn MailboxApi>, sleeper: Arc<dyn Sleeper>, policy: RetryPolicy) -> Self {
        Self {
            api,
            sleeper,
            policy,
        }
    }

    /// Every message reachable from `endpoint`. Any page that fails for good
    /// fails the whole fetch.
    pub async fn fetch_all(&self, endpoint: &str) -> Result<Vec<EmailMessage>> {
        let mut messages = Vec::new();
        let mut seen_links = HashSet::new();
        let mut next = Some(endpoint.to_string());
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            if !seen_links.insert(url.clone()) {
                warn!("Pagination link repeated, stopping after {} pages", pages);
                break;
            }

            let label = format!("page {}", pages + 1);
            let page = self
                .policy
                .run(self.sleeper.as_ref(), &label, || self.api.list_page(&url))
                .await?;

            pages += 1;
            messages.extend(page.messages);
            next = page.next_link;
        }

        info!("Fetched {} messages across {} pages", messages.len(), pages);
        Ok(messages)
    }
}
