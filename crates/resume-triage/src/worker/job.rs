use std::sync::Arc;

use crate::error::ProcessError;
use crate::mailbox::DownloadedAttachment;
use crate::processor::DocumentKind;
use crate::scoring::Evaluation;

/// One attachment waiting for extraction and scoring. Workers never see
/// shared mutable state; everything they need travels with the job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    /// Position within the submitted batch; results are re-sorted by it.
    pub sequence: usize,
    pub kind: DocumentKind,
    pub hash: String,
    pub attachment: Arc<DownloadedAttachment>,
}

impl Job {
    pub fn new(
        sequence: usize,
        kind: DocumentKind,
        hash: String,
        attachment: Arc<DownloadedAttachment>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sequence,
            kind,
            hash,
            attachment,
        }
    }

    pub fn filename(&self) -> &str {
        &self.attachment.filename
    }
}

/// Immutable record a worker hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub sequence: usize,
    pub kind: DocumentKind,
    pub hash: String,
    pub attachment: Arc<DownloadedAttachment>,
    pub ocr_used: bool,
    pub char_count: usize,
    pub extraction_error: Option<ProcessError>,
    pub evaluation: Evaluation,
}

impl JobResult {
    pub fn new(
        job: &Job,
        ocr_used: bool,
        char_count: usize,
        extraction_error: Option<ProcessError>,
        evaluation: Evaluation,
    ) -> Self {
        Self {
            job_id: job.id.clone(),
            sequence: job.sequence,
            kind: job.kind,
            hash: job.hash.clone(),
            attachment: Arc::clone(&job.attachment),
            ocr_used,
            char_count,
            extraction_error,
            evaluation,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.evaluation.decision.is_approved()
    }
}
