use std::fmt;
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use log::debug;
use serde::Serialize;

use crate::config::DownloadConfig;
use crate::error::{ConfigError, ProcessError};
use crate::processor::DocumentKind;
use crate::sanitize::safe_filename;

use super::client::MailboxApi;
use super::error::Result;
use super::retry::{RetryPolicy, Sleeper};
use super::types::{AttachmentRef, DownloadedAttachment};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Why an attachment never reached extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "skip", rename_all = "snake_case")]
pub enum SkipReason {
    /// Item or reference attachment without a file payload.
    NotAFile,
    Unsupported { format: String },
    Excluded { filename: String },
    TooLarge { size: u64, limit: u64 },
    Empty,
    Duplicate { hash: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAFile => write!(f, "not a file attachment"),
            Self::Unsupported { format } => write!(f, "unsupported format '{}'", format),
            Self::Excluded { filename } => {
                write!(f, "'{}' excluded by filename filters", filename)
            }
            Self::TooLarge { size, limit } => {
                write!(f, "{} bytes exceeds limit of {}", size, limit)
            }
            Self::Empty => write!(f, "empty attachment"),
            Self::Duplicate { hash } => {
                write!(f, "duplicate content {}", &hash[..hash.len().min(12)])
            }
        }
    }
}

impl From<ProcessError> for SkipReason {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::UnsupportedFormat(format) => Self::Unsupported { format },
            other => Self::Unsupported {
                format: other.to_string(),
            },
        }
    }
}

/// Filename globs and the size limit, applied before and after download.
#[derive(Debug, Clone)]
pub struct AttachmentFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    max_bytes: u64,
}

impl AttachmentFilter {
    pub fn from_config(config: &DownloadConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
            max_bytes: config.max_bytes,
        })
    }

    /// Decides from metadata alone whether the attachment is worth fetching.
    pub fn screen(
        &self,
        attachment: &AttachmentRef,
    ) -> std::result::Result<DocumentKind, SkipReason> {
        if !attachment.is_file() {
            return Err(SkipReason::NotAFile);
        }

        let filename = safe_filename(&attachment.name);
        let matches = |patterns: &[Pattern]| {
            patterns
                .iter()
                .any(|p| p.matches_with(&filename, MATCH_OPTIONS))
        };
        if !self.include.is_empty() && !matches(&self.include) {
            return Err(SkipReason::Excluded { filename });
        }
        if matches(&self.exclude) {
            return Err(SkipReason::Excluded { filename });
        }

        let kind = DocumentKind::detect(&filename, attachment.content_type.as_deref())?;

        if let Some(size) = attachment.size {
            self.check_size(size)?;
        }
        Ok(kind)
    }

    /// Declared sizes can lie, so the downloaded length is checked too.
    pub fn check_size(&self, size: u64) -> std::result::Result<(), SkipReason> {
        if size == 0 {
            Err(SkipReason::Empty)
        } else if size > self.max_bytes {
            Err(SkipReason::TooLarge {
                size,
                limit: self.max_bytes,
            })
        } else {
            Ok(())
        }
    }
}

fn compile(patterns: &[String]) -> std::result::Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ConfigError::InvalidPattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Lists and fetches attachments through the retry state machine.
pub struct AttachmentDownloader {
    api: Arc<dyn MailboxApi>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    filter: AttachmentFilter,
}

impl AttachmentDownloader {
    pub fn new(
        api: Arc<dyn MailboxApi>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        filter: AttachmentFilter,
    ) -> Self {
        Self {
            api,
            sleeper,
            policy,
            filter,
        }
    }

    pub fn filter(&self) -> &AttachmentFilter {
        &self.filter
    }

    pub async fn list(&self, message_id: &str) -> Result<Vec<AttachmentRef>> {
        let label = format!("attachments of {}", message_id);
        self.policy
            .run(self.sleeper.as_ref(), &label, || {
                self.api.list_attachments(message_id)
            })
            .await
    }

    pub async fn download(
        &self,
        message_id: &str,
        attachment: &AttachmentRef,
    ) -> Result<DownloadedAttachment> {
        let label = format!("attachment {}", attachment.id);
        let bytes = self
            .policy
            .run(self.sleeper.as_ref(), &label, || {
                self.api.download_attachment(message_id, attachment)
            })
            .await?;

        debug!("Downloaded {} bytes for attachment {}", bytes.len(), attachment.id);
        Ok(DownloadedAttachment {
            message_id: message_id.to_string(),
            attachment_id: attachment.id.clone(),
            original_name: attachment.name.clone(),
            filename: safe_filename(&attachment.name),
            content_type: attachment.content_type.clone(),
            bytes,
        })
    }
}
