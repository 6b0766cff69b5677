use serde::Serialize;
use thiserror::Error;

use crate::error::{StorageError, WorkerError};
use crate::mailbox::MailboxError;

/// Failures that end a run. Everything else becomes a [`PipelineWarning`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Mailbox authentication failed: {0}")]
    Auth(MailboxError),

    #[error("Fetching messages failed: {0}")]
    FatalFetch(MailboxError),

    #[error("Worker pool failed: {0}")]
    Worker(#[from] WorkerError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl From<MailboxError> for PipelineError {
    fn from(err: MailboxError) -> Self {
        if err.is_auth() {
            Self::Auth(err)
        } else {
            Self::FatalFetch(err)
        }
    }
}

/// Contained failures, kept in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum PipelineWarning {
    ListAttachmentsFailed { message_id: String, error: String },
    DownloadFailed { message_id: String, attachment: String, error: String },
    StoreFailed { filename: String, error: String },
    CachePersistFailed { error: String },
    MarkReadFailed { message_id: String, error: String },
}
