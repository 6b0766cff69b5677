use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::secrets::SecretSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    pub version: String,
    pub job: JobSpec,
    #[serde(default)]
    pub mailbox: Option<MailboxConfig>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// What a candidate is screened against. Supplied once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_keywords: Vec<String>,
    #[serde(default)]
    pub desired_keywords: Vec<String>,
    #[serde(default)]
    pub negative_keywords: Vec<String>,
    #[serde(default)]
    pub formations: Vec<String>,
    /// Extra synonym groups merged over the built-in ones.
    #[serde(default)]
    pub formation_synonyms: BTreeMap<String, Vec<String>>,
    /// Minimum total score; `None` leaves approval to the term conditions.
    #[serde(default)]
    pub threshold: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Message-list URL, e.g.
    /// `https://graph.microsoft.com/v1.0/users/hr@example.com/messages?$filter=isRead eq false`.
    pub endpoint: String,
    /// Root used for attachment and mark-as-read calls. Derived from the
    /// endpoint when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    pub auth: AuthConfig,
    #[serde(default = "default_true")]
    pub mark_as_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Pre-issued bearer token.
    Token { token: SecretSource },
    /// OAuth2 client-credentials grant.
    ClientCredentials {
        authority: String,
        client_id: String,
        client_secret: SecretSource,
        #[serde(default = "default_scope")]
        scope: String,
    },
}

fn default_scope() -> String {
    "https://graph.microsoft.com/.default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Attempts per page for transient failures. Rate limiting is not counted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_after_secs() -> u64 {
    5
}

fn default_backoff_cap_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_retry_after_secs: default_retry_after_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Glob patterns; when non-empty a filename must match one of them.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_max_bytes() -> u64 {
    20 * 1024 * 1024
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            max_bytes: default_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Below this many non-whitespace characters a PDF text layer is
    /// considered missing.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["por".to_string(), "eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

fn default_min_text_chars() -> usize {
    80
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            dpi: default_dpi(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    #[serde(default = "default_required_weight")]
    pub required_weight: u32,
    #[serde(default = "default_desired_weight")]
    pub desired_weight: u32,
    #[serde(default = "default_formation_weight")]
    pub formation_weight: u32,
    /// Multiplier on `cosine * token_count`.
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_semantic_cap")]
    pub semantic_cap: u32,
    #[serde(default = "default_ceiling")]
    pub ceiling: u32,
    /// Jaro-Winkler threshold in `(0, 1]`; enables fuzzy keyword hits.
    #[serde(default)]
    pub fuzzy_threshold: Option<f64>,
}

fn default_required_weight() -> u32 {
    3
}

fn default_desired_weight() -> u32 {
    1
}

fn default_formation_weight() -> u32 {
    2
}

fn default_semantic_weight() -> f64 {
    2.0
}

fn default_semantic_cap() -> u32 {
    40
}

fn default_ceiling() -> u32 {
    100
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            required_weight: default_required_weight(),
            desired_weight: default_desired_weight(),
            formation_weight: default_formation_weight(),
            semantic_weight: default_semantic_weight(),
            semantic_cap: default_semantic_cap(),
            ceiling: default_ceiling(),
            fuzzy_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Approved files land in `<approved_directory>/<job-slug>/<YYYY-MM-DD>/`.
    #[serde(default = "default_approved_directory")]
    pub approved_directory: PathBuf,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// JSON report of every processed attachment plus the run summary.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

fn default_approved_directory() -> PathBuf {
    PathBuf::from("approved")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".triage_cache/hashes.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            approved_directory: default_approved_directory(),
            cache_path: default_cache_path(),
            report_path: None,
        }
    }
}
