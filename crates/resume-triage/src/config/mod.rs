pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, ConfigFormat};
pub use schema::{
    AuthConfig, DownloadConfig, FetchConfig, JobSpec, MailboxConfig, OcrConfig, OutputConfig,
    ScoringConfig, TriageConfig,
};

impl TriageConfig {
    /// Worker threads to start; `0` means one per CPU.
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get()
        } else {
            self.worker_count
        }
    }
}
