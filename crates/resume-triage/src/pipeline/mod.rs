pub mod approval;
pub mod config;
pub mod error;
pub mod offline;
pub mod progress;
pub mod report;
pub mod runner;

pub use approval::{ApprovalPipeline, ApprovalPipelineBuilder};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineWarning};
pub use offline::{score_local_file, LocalScore};
pub use progress::{
    AttachmentPhase, LogProgress, NoopProgress, ProgressEvent, ProgressReporter, RecordingProgress,
};
pub use report::{
    CandidateRecord, CollectingSink, FormationCount, JsonReportSink, ResultSink, RunSummary,
    SkipCounts,
};
pub use runner::Pipeline;
