pub mod config;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod matching;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod scoring;
pub mod secrets;
pub mod storage;
pub mod worker;

pub use config::{load_config, JobSpec, TriageConfig};
pub use error::{ConfigError, ProcessError, Result, StorageError, TriageError, WorkerError};
pub use mailbox::{GraphClient, MailboxApi, MailboxError, MessageFetcher};
pub use pipeline::{ApprovalPipeline, CandidateRecord, PipelineError, RunSummary};
pub use processor::{ContentExtractor, DocumentKind, ExtractionOutcome, OcrCapability};
pub use scoring::{CandidateScorer, Decision, Evaluation, RejectReason};
pub use secrets::{SecretError, SecretSource};
