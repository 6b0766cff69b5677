//! Per-attachment records and the end-of-run summary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::StorageError;
use crate::mailbox::SkipReason;
use crate::processor::DocumentKind;
use crate::scoring::{RejectReason, ScoreBreakdown};
use crate::worker::JobResult;

use super::error::PipelineWarning;

const TOP_FORMATIONS: usize = 5;

/// One processed attachment, approved or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub message_id: String,
    pub attachment_id: String,
    pub filename: String,
    pub sha256: String,
    pub kind: DocumentKind,
    pub ocr_used: bool,
    pub char_count: usize,
    pub score: ScoreBreakdown,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    pub matched_formations: Vec<String>,
    pub matched_keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_path: Option<PathBuf>,
}

impl CandidateRecord {
    /// Record for a worker result, before anything was stored.
    pub fn from_result(result: &JobResult) -> Self {
        let evaluation = &result.evaluation;
        Self {
            message_id: result.attachment.message_id.clone(),
            attachment_id: result.attachment.attachment_id.clone(),
            filename: result.attachment.filename.clone(),
            sha256: result.hash.clone(),
            kind: result.kind,
            ocr_used: result.ocr_used,
            char_count: result.char_count,
            score: evaluation.breakdown,
            approved: evaluation.decision.is_approved(),
            reject_reason: evaluation.decision.reject_reason().cloned(),
            matched_formations: evaluation.matched_formations.clone(),
            matched_keywords: evaluation.matched_keywords.clone(),
            extraction_error: result.extraction_error.as_ref().map(|e| e.to_string()),
            stored_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub not_a_file: usize,
    pub unsupported: usize,
    pub filtered: usize,
    pub too_large: usize,
    pub empty: usize,
    pub duplicate: usize,
    pub download_failed: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.not_a_file
            + self.unsupported
            + self.filtered
            + self.too_large
            + self.empty
            + self.duplicate
            + self.download_failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormationCount {
    pub formation: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub messages_seen: usize,
    pub messages_without_attachments: usize,
    pub messages_marked_read: usize,
    pub attachments_seen: usize,
    pub skipped: SkipCounts,
    pub processed: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Approved as a percentage of processed, two decimals.
    pub approval_rate: f64,
    /// Most frequent formations among approved candidates.
    pub top_formations: Vec<FormationCount>,
    pub warnings: Vec<PipelineWarning>,
    pub dry_run: bool,
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    #[serde(skip)]
    formation_counts: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn record_skip(&mut self, reason: &SkipReason) {
        let counter = match reason {
            SkipReason::NotAFile => &mut self.skipped.not_a_file,
            SkipReason::Unsupported { .. } => &mut self.skipped.unsupported,
            SkipReason::Excluded { .. } => &mut self.skipped.filtered,
            SkipReason::TooLarge { .. } => &mut self.skipped.too_large,
            SkipReason::Empty => &mut self.skipped.empty,
            SkipReason::Duplicate { .. } => &mut self.skipped.duplicate,
        };
        *counter += 1;
    }

    pub fn record_download_failure(&mut self, warning: PipelineWarning) {
        self.skipped.download_failed += 1;
        self.warnings.push(warning);
    }

    pub fn record(&mut self, record: &CandidateRecord) {
        self.processed += 1;
        if record.approved {
            self.approved += 1;
            for formation in &record.matched_formations {
                *self.formation_counts.entry(formation.clone()).or_default() += 1;
            }
        } else {
            self.rejected += 1;
        }
    }

    /// Fills the derived fields. Call once, after the last record.
    pub fn finish(&mut self) {
        self.approval_rate = if self.processed == 0 {
            0.0
        } else {
            let pct = self.approved as f64 / self.processed as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        };

        let mut counts: Vec<FormationCount> = self
            .formation_counts
            .iter()
            .map(|(formation, count)| FormationCount {
                formation: formation.clone(),
                count: *count,
            })
            .collect();
        // Stable sort keeps ties in alphabetical order.
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts.truncate(TOP_FORMATIONS);
        self.top_formations = counts;
    }

    pub fn log(&self) {
        info!(
            "Run finished: {} messages, {} attachments, {} processed, {} approved ({:.2}%), {} skipped",
            self.messages_seen,
            self.attachments_seen,
            self.processed,
            self.approved,
            self.approval_rate,
            self.skipped.total()
        );
        for entry in &self.top_formations {
            info!("  {}: {}", entry.formation, entry.count);
        }
        if self.interrupted {
            info!("Run was interrupted before all messages were handled");
        }
    }
}

/// Receives candidate records as they are produced.
pub trait ResultSink: Send {
    fn record(&mut self, record: &CandidateRecord);

    fn finish(&mut self, _summary: &RunSummary) -> Result<(), StorageError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CollectingSink {
    pub records: Vec<CandidateRecord>,
    pub summary: Option<RunSummary>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approved(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.records.iter().filter(|r| r.approved)
    }
}

impl ResultSink for CollectingSink {
    fn record(&mut self, record: &CandidateRecord) {
        self.records.push(record.clone());
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), StorageError> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a RunSummary,
    candidates: &'a [CandidateRecord],
}

/// Writes `{ "summary": ..., "candidates": [...] }` when the run finishes.
pub struct JsonReportSink {
    path: PathBuf,
    records: Vec<CandidateRecord>,
}

impl JsonReportSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
        }
    }
}

impl ResultSink for JsonReportSink {
    fn record(&mut self, record: &CandidateRecord) {
        self.records.push(record.clone());
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let report = Report {
            summary,
            candidates: &self.records,
        };
        let json = serde_json::to_vec_pretty(&report).map_err(|e| StorageError::Serialize {
            path: self.path.clone(),
            source: e,
        })?;
        std::fs::write(&self.path, json).map_err(|e| StorageError::WriteFile {
            path: self.path.clone(),
            source: e,
        })?;

        info!(
            "Report written to {}",
            crate::sanitize::redact_path(&self.path)
        );
        Ok(())
    }
}
