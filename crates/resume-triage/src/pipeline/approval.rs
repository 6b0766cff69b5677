//! Run orchestration: fetch messages, screen and download attachments,
//! fan extraction out to the worker pool, then fold results back in on
//! this task alone.
//!
//! A message is marked read only when every one of its attachments was
//! handled and the run was not stopped half way through it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use log::{error, info, warn};

use crate::config::TriageConfig;
use crate::error::{TriageError, WorkerError};
use crate::mailbox::{
    has_unread_filter, AttachmentDownloader, AttachmentFilter, EmailMessage, MailboxApi,
    MessageFetcher, RetryPolicy, SkipReason, Sleeper, TokioSleeper,
};
use crate::processor::ContentExtractor;
use crate::scoring::RejectReason;
use crate::sanitize::{job_slug, redact_path};
use crate::storage::{content_hash, DedupCache, FileStorage};
use crate::worker::{Job, JobResult, WorkerPool};

use super::config::PipelineConfig;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{LogProgress, ProgressReporter};
use super::report::{CandidateRecord, ResultSink, RunSummary};

pub struct ApprovalPipeline {
    api: Arc<dyn MailboxApi>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    fetcher: MessageFetcher,
    downloader: AttachmentDownloader,
    pool: Arc<WorkerPool>,
    storage: FileStorage,
    cache: DedupCache,
    job_slug: String,
    date: NaiveDate,
    dry_run: bool,
    mark_as_read: bool,
    stop: Arc<AtomicBool>,
}

pub struct ApprovalPipelineBuilder<'a> {
    config: &'a TriageConfig,
    api: Arc<dyn MailboxApi>,
    sleeper: Arc<dyn Sleeper>,
    progress: Arc<dyn ProgressReporter>,
    extractor: Option<ContentExtractor>,
    stop: Option<Arc<AtomicBool>>,
    date: Option<NaiveDate>,
    dry_run: bool,
}

impl<'a> ApprovalPipelineBuilder<'a> {
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Skips probing the OCR backend.
    pub fn extractor(mut self, extractor: ContentExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Date used for the approved folder; defaults to today (local time).
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Result<ApprovalPipeline, TriageError> {
        let config = self.config;
        let policy = RetryPolicy::from_config(&config.fetch);
        let filter = AttachmentFilter::from_config(&config.downloads)?;

        let pipeline_config = Arc::new(match self.extractor {
            Some(extractor) => PipelineConfig::with_extractor(config, extractor),
            None => PipelineConfig::from_config(config),
        });
        let pool = WorkerPool::new(
            pipeline_config,
            config.effective_worker_count(),
            self.progress,
        )?;

        let cache = DedupCache::load(&config.output.cache_path)?;

        Ok(ApprovalPipeline {
            fetcher: MessageFetcher::new(Arc::clone(&self.api), Arc::clone(&self.sleeper), policy),
            downloader: AttachmentDownloader::new(
                Arc::clone(&self.api),
                Arc::clone(&self.sleeper),
                policy,
                filter,
            ),
            api: self.api,
            sleeper: self.sleeper,
            policy,
            pool: Arc::new(pool),
            storage: FileStorage::new(&config.output.approved_directory),
            cache,
            job_slug: job_slug(&config.job.title),
            date: self
                .date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            dry_run: self.dry_run,
            mark_as_read: config.mailbox.as_ref().is_none_or(|m| m.mark_as_read),
            stop: self.stop.unwrap_or_default(),
        })
    }
}

impl ApprovalPipeline {
    pub fn builder(config: &TriageConfig, api: Arc<dyn MailboxApi>) -> ApprovalPipelineBuilder<'_> {
        ApprovalPipelineBuilder {
            config,
            api,
            sleeper: Arc::new(TokioSleeper),
            progress: Arc::new(LogProgress),
            extractor: None,
            stop: None,
            date: None,
            dry_run: false,
        }
    }

    /// Setting the flag stops the run at the next message or attachment.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Processes every message behind `endpoint`. The sink always receives
    /// the summary, including when the run ends with an error.
    pub async fn run(
        &mut self,
        endpoint: &str,
        sink: &mut dyn ResultSink,
    ) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::new(self.dry_run);

        if !has_unread_filter(endpoint) {
            warn!("Endpoint has no isRead filter; messages already read will be processed again");
        }
        if self.dry_run {
            info!("Dry run: nothing will be stored, cached or marked read");
        }

        let outcome = self.process_all(endpoint, &mut summary, sink).await;
        if let Err(e) = &outcome {
            error!("Run aborted: {}", e);
            summary.fatal_error = Some(e.to_string());
        }

        if !self.dry_run {
            if let Err(e) = self.cache.persist() {
                error!("Failed to persist dedup cache: {}", e);
                summary.warnings.push(PipelineWarning::CachePersistFailed {
                    error: e.to_string(),
                });
            }
        }

        summary.finish();
        summary.log();
        if let Err(e) = sink.finish(&summary) {
            error!("Failed to write report: {}", e);
        }

        outcome.map(|()| summary)
    }

    async fn process_all(
        &mut self,
        endpoint: &str,
        summary: &mut RunSummary,
        sink: &mut dyn ResultSink,
    ) -> Result<(), PipelineError> {
        let messages = self.fetcher.fetch_all(endpoint).await?;
        let mut seen_hashes = HashSet::new();

        for message in &messages {
            if self.stopped() {
                info!("Stop requested, leaving remaining messages for the next run");
                summary.interrupted = true;
                break;
            }
            summary.messages_seen += 1;

            if !message.has_attachments {
                summary.messages_without_attachments += 1;
                continue;
            }

            let complete = self
                .process_message(message, summary, &mut seen_hashes, sink)
                .await?;

            if complete && !self.stopped() {
                self.finish_message(message, summary).await;
            } else {
                info!("Message {} left unread for a later run", message.id);
            }
        }

        Ok(())
    }

    /// Returns whether every attachment was fully handled.
    async fn process_message(
        &mut self,
        message: &EmailMessage,
        summary: &mut RunSummary,
        seen_hashes: &mut HashSet<String>,
        sink: &mut dyn ResultSink,
    ) -> Result<bool, PipelineError> {
        info!(
            "Message {} from {}: {}",
            message.id,
            message.sender.as_deref().unwrap_or("unknown sender"),
            message.subject
        );

        let attachments = match self.downloader.list(&message.id).await {
            Ok(list) => list,
            Err(e) if e.is_auth() => return Err(PipelineError::Auth(e)),
            Err(e) => {
                warn!("Could not list attachments of {}: {}", message.id, e);
                summary.warnings.push(PipelineWarning::ListAttachmentsFailed {
                    message_id: message.id.clone(),
                    error: e.to_string(),
                });
                return Ok(false);
            }
        };

        let mut complete = true;
        let mut jobs = Vec::new();

        for attachment in &attachments {
            if self.stopped() {
                complete = false;
                break;
            }
            summary.attachments_seen += 1;

            let kind = match self.downloader.filter().screen(attachment) {
                Ok(kind) => kind,
                Err(reason) => {
                    info!("[SKIP] {}: {}", attachment.name, reason);
                    summary.record_skip(&reason);
                    continue;
                }
            };

            let downloaded = match self.downloader.download(&message.id, attachment).await {
                Ok(downloaded) => downloaded,
                Err(e) if e.is_auth() => return Err(PipelineError::Auth(e)),
                Err(e) => {
                    warn!("Download of {} failed: {}", attachment.name, e);
                    summary.record_download_failure(PipelineWarning::DownloadFailed {
                        message_id: message.id.clone(),
                        attachment: attachment.name.clone(),
                        error: e.to_string(),
                    });
                    complete = false;
                    continue;
                }
            };

            if let Err(reason) = self
                .downloader
                .filter()
                .check_size(downloaded.bytes.len() as u64)
            {
                info!("[SKIP] {}: {}", downloaded.filename, reason);
                summary.record_skip(&reason);
                continue;
            }

            let hash = content_hash(&downloaded.bytes);
            if self.cache.contains(&hash) || !seen_hashes.insert(hash.clone()) {
                let reason = SkipReason::Duplicate { hash };
                info!("[SKIP] {}: {}", downloaded.filename, reason);
                summary.record_skip(&reason);
                continue;
            }

            jobs.push(Job::new(jobs.len(), kind, hash, Arc::new(downloaded)));
        }

        if jobs.is_empty() {
            return Ok(complete);
        }

        let pool = Arc::clone(&self.pool);
        let results = tokio::task::spawn_blocking(move || pool.process_batch(jobs))
            .await
            .map_err(|e| WorkerError::BatchAborted(e.to_string()))??;

        for result in results {
            let (record, handled) = self.settle(result, summary);
            complete &= handled;
            summary.record(&record);
            sink.record(&record);
        }

        Ok(complete)
    }

    /// Applies a worker result: stores approved bytes and records the hash.
    /// Returns the record and whether the attachment is fully handled.
    fn settle(&mut self, result: JobResult, summary: &mut RunSummary) -> (CandidateRecord, bool) {
        let mut record = CandidateRecord::from_result(&result);

        info!(
            "[SCAN] {} chars={} ocr={} score={} -> {}",
            record.filename,
            record.char_count,
            record.ocr_used,
            record.score.total,
            match &record.reject_reason {
                None => "approved".to_string(),
                Some(reason) => format!("rejected ({})", reason),
            }
        );

        if !record.approved || self.dry_run {
            return (record, true);
        }

        match self.storage.store_approved(
            &self.job_slug,
            self.date,
            &result.attachment.filename,
            &result.attachment.bytes,
        ) {
            Ok(path) => {
                info!("[MOVE] APPROVED -> {}", redact_path(&path));
                self.cache.add(&result.hash);
                if let Err(e) = self.cache.persist() {
                    error!("Failed to persist dedup cache: {}", e);
                    summary.warnings.push(PipelineWarning::CachePersistFailed {
                        error: e.to_string(),
                    });
                }
                record.stored_path = Some(path);
                (record, true)
            }
            Err(e) => {
                error!("Failed to store {}: {}", record.filename, e);
                summary.warnings.push(PipelineWarning::StoreFailed {
                    filename: record.filename.clone(),
                    error: e.to_string(),
                });
                record.approved = false;
                record.reject_reason = Some(RejectReason::StoreFailed {
                    error: e.to_string(),
                });
                (record, false)
            }
        }
    }

    async fn finish_message(&self, message: &EmailMessage, summary: &mut RunSummary) {
        if self.dry_run || !self.mark_as_read {
            return;
        }

        let label = format!("mark {} read", message.id);
        match self
            .policy
            .run(self.sleeper.as_ref(), &label, || self.api.mark_read(&message.id))
            .await
        {
            Ok(()) => {
                summary.messages_marked_read += 1;
                info!("Message {} marked as read", message.id);
            }
            Err(e) => {
                warn!("Could not mark {} as read: {}", message.id, e);
                summary.warnings.push(PipelineWarning::MarkReadFailed {
                    message_id: message.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Stops the workers and waits for them.
    pub fn shutdown(self) {
        match Arc::try_unwrap(self.pool) {
            Ok(pool) => pool.wait(),
            Err(pool) => pool.shutdown(),
        }
    }
}
