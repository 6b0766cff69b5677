use std::sync::Arc;

use tracing::{debug, info_span};

use crate::error::ProcessError;
use crate::matching::TextNormalizer;
use crate::processor::{ContentExtractor, ExtractionOutcome};
use crate::scoring::CandidateScorer;
use crate::worker::job::{Job, JobResult};

use super::config::PipelineConfig;
use super::progress::{AttachmentPhase, ProgressEvent, ProgressReporter};

/// Extract, normalize and score one attachment. Pure with respect to the
/// job: no filesystem, network or shared state is touched.
pub struct Pipeline {
    extractor: ContentExtractor,
    normalizer: TextNormalizer,
    scorer: CandidateScorer,
}

impl Pipeline {
    pub fn from_config(config: Arc<PipelineConfig>) -> Self {
        Self {
            extractor: config.extractor.clone(),
            normalizer: TextNormalizer::new(),
            scorer: CandidateScorer::new(&config.job, &config.scoring),
        }
    }

    pub fn run(&self, job: &Job, progress: &dyn ProgressReporter) -> JobResult {
        let _pipeline_span = info_span!("pipeline",
            job_id = %job.id,
            filename = %job.filename(),
            kind = ?job.kind,
        )
        .entered();

        let outcome = {
            let _step = info_span!("extract").entered();
            progress.report(ProgressEvent::Phase {
                job_id: job.id.clone(),
                phase: AttachmentPhase::Extracting,
            });
            self.extractor.extract(job.kind, &job.attachment.bytes)
        };

        let extraction_error = match &outcome {
            ExtractionOutcome::Failed { error, .. } => {
                progress.report(ProgressEvent::Failed {
                    job_id: job.id.clone(),
                    error: error.to_string(),
                });
                Some(error.clone())
            }
            ExtractionOutcome::Text(_) => None,
        };
        let document = outcome.into_document();

        let normalized = {
            let _step = info_span!("normalize").entered();
            progress.report(ProgressEvent::Phase {
                job_id: job.id.clone(),
                phase: AttachmentPhase::Normalizing,
            });
            self.normalizer.normalize(&document.text)
        };

        let evaluation = {
            let _step = info_span!("score").entered();
            progress.report(ProgressEvent::Phase {
                job_id: job.id.clone(),
                phase: AttachmentPhase::Scoring,
            });
            self.scorer.evaluate(&normalized)
        };

        debug!(
            score = evaluation.breakdown.total,
            approved = evaluation.decision.is_approved(),
            "scored"
        );
        progress.report(ProgressEvent::Completed {
            job_id: job.id.clone(),
            filename: job.filename().to_string(),
            score: evaluation.breakdown.total,
            approved: evaluation.decision.is_approved(),
        });

        JobResult::new(
            job,
            document.ocr_used,
            document.char_count,
            extraction_error,
            evaluation,
        )
    }

    /// Result for a job whose processing panicked: scored as empty text.
    pub fn failed(&self, job: &Job, error: ProcessError) -> JobResult {
        JobResult::new(job, false, 0, Some(error), self.scorer.evaluate(""))
    }
}
