//! Scoring local files without a mailbox, for tuning a job definition.

use std::path::Path;
use std::sync::Arc;

use crate::error::StorageError;
use crate::mailbox::{DownloadedAttachment, SkipReason};
use crate::processor::DocumentKind;
use crate::sanitize::safe_filename;
use crate::storage::content_hash;
use crate::worker::Job;

use super::progress::NoopProgress;
use super::report::CandidateRecord;
use super::runner::Pipeline;

#[derive(Debug, Clone, PartialEq)]
pub enum LocalScore {
    Scored(CandidateRecord),
    Skipped(SkipReason),
}

pub fn score_local_file(pipeline: &Pipeline, path: &Path) -> Result<LocalScore, StorageError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filename = safe_filename(&name);
    let content_type = mime_guess::from_path(path).first().map(|m| m.to_string());

    let kind = match DocumentKind::detect(&filename, content_type.as_deref()) {
        Ok(kind) => kind,
        Err(e) => return Ok(LocalScore::Skipped(SkipReason::from(e))),
    };

    let bytes = std::fs::read(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    if bytes.is_empty() {
        return Ok(LocalScore::Skipped(SkipReason::Empty));
    }

    let job = Job::new(
        0,
        kind,
        content_hash(&bytes),
        Arc::new(DownloadedAttachment {
            message_id: String::new(),
            attachment_id: String::new(),
            original_name: name,
            filename,
            content_type,
            bytes,
        }),
    );

    let result = pipeline.run(&job, &NoopProgress);
    Ok(LocalScore::Scored(CandidateRecord::from_result(&result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JobSpec, ScoringConfig};
    use crate::pipeline::PipelineConfig;
    use crate::processor::{ContentExtractor, OcrCapability};
    use assert_fs::prelude::*;

    fn pipeline() -> Pipeline {
        Pipeline::from_config(Arc::new(PipelineConfig {
            job: JobSpec {
                title: "Químico".to_string(),
                formations: vec!["quimica".to_string()],
                ..Default::default()
            },
            scoring: ScoringConfig::default(),
            extractor: ContentExtractor::new(OcrCapability::unavailable("test"), 80),
        }))
    }

    #[test]
    fn test_scores_text_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("cv.txt");
        file.write_str("QUÍMICO formado em Química Industrial").unwrap();

        match score_local_file(&pipeline(), file.path()).unwrap() {
            LocalScore::Scored(record) => {
                assert!(record.approved, "{:?}", record);
                assert!(record
                    .matched_formations
                    .contains(&"quimica industrial".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_archive_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("docs.zip");
        file.write_binary(b"PK\x03\x04").unwrap();

        assert!(matches!(
            score_local_file(&pipeline(), file.path()).unwrap(),
            LocalScore::Skipped(SkipReason::Unsupported { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(score_local_file(&pipeline(), &temp.path().join("cv.pdf")).is_err());
    }
}
