//! Test harness for isolated triage runs.
//!
//! The `TestHarness` struct provides a complete isolated environment:
//! - A temporary root holding the approved directory and the dedup cache
//! - A scripted `FakeMailbox` standing in for the Graph API
//! - A `RecordingSleeper`, so retry waits are observed instead of slept
//! - Full pipeline execution with the records and summary captured

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use resume_triage::config::TriageConfig;
use resume_triage::mailbox::{
    AttachmentRef, EmailMessage, MailboxApi, MailboxError, MessagePage, RecordingSleeper,
};
use resume_triage::pipeline::{CollectingSink, NoopProgress, PipelineError, RunSummary};
use resume_triage::processor::{OcrEngine, PageRasterizer};
use resume_triage::{ApprovalPipeline, ContentExtractor, OcrCapability, ProcessError};

use super::builders::{attachment_ref, message, ConfigBuilder, ENDPOINT};

type MailboxResult<T> = Result<T, MailboxError>;

/// In-memory mailbox. Messages live on a single listing page unless more
/// pages are added explicitly; every call is recorded.
#[derive(Default)]
pub struct FakeMailbox {
    pages: HashMap<String, MessagePage>,
    attachments: HashMap<String, Vec<(AttachmentRef, Vec<u8>)>>,
    page_failures: Mutex<VecDeque<MailboxError>>,
    list_failures: HashMap<String, MailboxError>,
    download_failures: HashMap<String, MailboxError>,
    mark_read_failures: HashMap<String, MailboxError>,
    pub page_requests: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
    pub marked_read: Mutex<Vec<String>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        let mut mailbox = Self::default();
        mailbox.pages.insert(ENDPOINT.to_string(), MessagePage::default());
        mailbox
    }

    fn push_message(&mut self, url: &str, message: EmailMessage) {
        self.pages
            .entry(url.to_string())
            .or_default()
            .messages
            .push(message);
    }

    /// Adds a message with the given `(name, content type, bytes)` files.
    pub fn with_message(mut self, id: &str, files: Vec<(&str, &str, Vec<u8>)>) -> Self {
        self.push_message(ENDPOINT, message(id, !files.is_empty()));
        let list = files
            .into_iter()
            .enumerate()
            .map(|(i, (name, content_type, bytes))| {
                let att = attachment_ref(&format!("{}-a{}", id, i), name, content_type, bytes.len());
                (att, bytes)
            })
            .collect();
        self.attachments.insert(id.to_string(), list);
        self
    }

    /// Adds a message whose attachments are given as raw refs.
    pub fn with_refs(mut self, id: &str, refs: Vec<(AttachmentRef, Vec<u8>)>) -> Self {
        self.push_message(ENDPOINT, message(id, true));
        self.attachments.insert(id.to_string(), refs);
        self
    }

    /// Appends a second page reachable through `next_link`.
    pub fn with_next_page(mut self, link: &str, id: &str, files: Vec<(&str, &str, Vec<u8>)>) -> Self {
        if let Some(first) = self.pages.get_mut(ENDPOINT) {
            first.next_link = Some(link.to_string());
        }
        self.push_message(link, message(id, !files.is_empty()));
        let list = files
            .into_iter()
            .enumerate()
            .map(|(i, (name, content_type, bytes))| {
                let att = attachment_ref(&format!("{}-a{}", id, i), name, content_type, bytes.len());
                (att, bytes)
            })
            .collect();
        self.attachments.insert(id.to_string(), list);
        self
    }

    /// The next listing calls fail with these errors, in order.
    pub fn failing_pages(self, errors: Vec<MailboxError>) -> Self {
        if let Ok(mut failures) = self.page_failures.lock() {
            failures.extend(errors);
        }
        self
    }

    pub fn failing_list(mut self, message_id: &str, error: MailboxError) -> Self {
        self.list_failures.insert(message_id.to_string(), error);
        self
    }

    pub fn failing_download(mut self, attachment_id: &str, error: MailboxError) -> Self {
        self.download_failures.insert(attachment_id.to_string(), error);
        self
    }

    pub fn failing_mark_read(mut self, message_id: &str, error: MailboxError) -> Self {
        self.mark_read_failures.insert(message_id.to_string(), error);
        self
    }

    pub fn page_requests(&self) -> Vec<String> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn marked_read(&self) -> Vec<String> {
        self.marked_read.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailboxApi for FakeMailbox {
    async fn list_page(&self, url: &str) -> MailboxResult<MessagePage> {
        self.page_requests.lock().unwrap().push(url.to_string());
        if let Some(error) = self.page_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.pages.get(url).cloned().ok_or(MailboxError::Http {
            status: 404,
            body: format!("no page at {}", url),
        })
    }

    async fn list_attachments(&self, message_id: &str) -> MailboxResult<Vec<AttachmentRef>> {
        if let Some(error) = self.list_failures.get(message_id) {
            return Err(error.clone());
        }
        Ok(self
            .attachments
            .get(message_id)
            .map(|list| list.iter().map(|(att, _)| att.clone()).collect())
            .unwrap_or_default())
    }

    async fn download_attachment(
        &self,
        message_id: &str,
        attachment: &AttachmentRef,
    ) -> MailboxResult<Vec<u8>> {
        self.downloads.lock().unwrap().push(attachment.id.clone());
        if let Some(error) = self.download_failures.get(&attachment.id) {
            return Err(error.clone());
        }
        self.attachments
            .get(message_id)
            .and_then(|list| list.iter().find(|(att, _)| att.id == attachment.id))
            .map(|(_, bytes)| bytes.clone())
            .ok_or(MailboxError::Http {
                status: 404,
                body: "attachment not found".to_string(),
            })
    }

    async fn mark_read(&self, message_id: &str) -> MailboxResult<()> {
        if let Some(error) = self.mark_read_failures.get(message_id) {
            return Err(error.clone());
        }
        self.marked_read.lock().unwrap().push(message_id.to_string());
        Ok(())
    }
}

/// OCR engine that "reads" the same text from every image.
pub struct FixedOcr(pub &'static str);

impl OcrEngine for FixedOcr {
    fn recognize(&self, _image: &[u8]) -> Result<String, ProcessError> {
        Ok(self.0.to_string())
    }
}

pub struct SinglePageRasterizer;

impl PageRasterizer for SinglePageRasterizer {
    fn page_count(&self, _pdf: &[u8]) -> Result<usize, ProcessError> {
        Ok(1)
    }

    fn render_page(&self, _pdf: &[u8], _page: u32) -> Result<Vec<u8>, ProcessError> {
        Ok(b"\x89PNG fake page".to_vec())
    }
}

/// Outcome of one harness run.
pub struct RunOutcome {
    pub result: Result<RunSummary, PipelineError>,
    pub sink: CollectingSink,
}

impl RunOutcome {
    /// Summary handed to the sink; present even when the run failed.
    pub fn summary(&self) -> &RunSummary {
        self.sink.summary.as_ref().expect("sink received no summary")
    }
}

pub struct TestHarness {
    pub temp_dir: TempDir,
    pub config: TriageConfig,
    pub sleeper: Arc<RecordingSleeper>,
    extractor: ContentExtractor,
    stop: Option<Arc<AtomicBool>>,
}

impl TestHarness {
    pub fn new(builder: ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = builder.build(temp_dir.path());
        let extractor = ContentExtractor::new(
            OcrCapability::unavailable("disabled in tests"),
            config.ocr.min_text_chars,
        );

        Self {
            temp_dir,
            config,
            sleeper: Arc::new(RecordingSleeper::new()),
            extractor,
            stop: None,
        }
    }

    /// Replaces the OCR backend with a fake that returns `text` for every page.
    pub fn with_ocr(mut self, text: &'static str) -> Self {
        self.extractor = ContentExtractor::new(
            OcrCapability::available(
                Arc::new(FixedOcr(text)),
                Some(Arc::new(SinglePageRasterizer)),
            ),
            self.config.ocr.min_text_chars,
        );
        self
    }

    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    /// Directory approved files of `slug` land in for the fixed test date.
    pub fn approved_dir(&self, slug: &str) -> PathBuf {
        self.config
            .output
            .approved_directory
            .join(slug)
            .join("2026-03-09")
    }

    pub fn approved_files(&self, slug: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.approved_dir(slug))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn cached_hashes(&self) -> Vec<String> {
        match std::fs::read(&self.config.output.cache_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).expect("cache is a JSON array"),
            Err(_) => Vec::new(),
        }
    }

    pub async fn run(&self, mailbox: Arc<FakeMailbox>, dry_run: bool) -> RunOutcome {
        let mut builder = ApprovalPipeline::builder(&self.config, mailbox)
            .extractor(self.extractor.clone())
            .sleeper(self.sleeper.clone())
            .progress(Arc::new(NoopProgress))
            .date(Self::date())
            .dry_run(dry_run);
        if let Some(stop) = &self.stop {
            builder = builder.stop_flag(Arc::clone(stop));
        }
        let mut pipeline = builder.build().expect("Failed to build pipeline");

        let mut sink = CollectingSink::new();
        let result = pipeline.run(ENDPOINT, &mut sink).await;
        pipeline.shutdown();

        RunOutcome { result, sink }
    }
}
