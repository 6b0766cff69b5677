use crate::config::{JobSpec, ScoringConfig, TriageConfig};
use crate::processor::ContentExtractor;

/// Everything a worker needs to turn attachment bytes into a decision.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub job: JobSpec,
    pub scoring: ScoringConfig,
    pub extractor: ContentExtractor,
}

impl PipelineConfig {
    /// Probes the OCR backend as part of construction.
    pub fn from_config(config: &TriageConfig) -> Self {
        Self::with_extractor(config, ContentExtractor::from_config(&config.ocr))
    }

    pub fn with_extractor(config: &TriageConfig, extractor: ContentExtractor) -> Self {
        Self {
            job: config.job.clone(),
            scoring: config.scoring.clone(),
            extractor,
        }
    }
}
