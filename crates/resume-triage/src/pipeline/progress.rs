use std::sync::Mutex;

use log::debug;

/// Per-attachment stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentPhase {
    Extracting,
    Normalizing,
    Scoring,
}

/// Events emitted while one attachment moves through the pipeline.
/// Extracted text is never part of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase {
        job_id: String,
        phase: AttachmentPhase,
    },
    Completed {
        job_id: String,
        filename: String,
        score: u32,
        approved: bool,
    },
    Failed {
        job_id: String,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes events to the debug log.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { job_id, phase } => debug!("[{}] {:?}", job_id, phase),
            ProgressEvent::Completed {
                job_id,
                filename,
                score,
                approved,
            } => debug!(
                "[{}] {} scored {} ({})",
                job_id,
                filename,
                score,
                if approved { "approved" } else { "rejected" }
            ),
            ProgressEvent::Failed { job_id, error } => debug!("[{}] failed: {}", job_id, error),
        }
    }
}

/// Keeps every event; handy in tests.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
