use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Cloudflare account ID. Without it the assessment service is unavailable.
    #[serde(default)]
    pub cf_account_id: Option<String>,

    /// Cloudflare Workers AI API token
    #[serde(default)]
    pub cf_api_token: Option<String>,

    /// Workers AI text-generation model used for assessments
    #[serde(default = "default_assessment_model")]
    pub assessment_model: String,

    #[serde(default = "default_assessment_timeout_secs")]
    pub assessment_timeout_secs: u64,

    /// Attempts per processing pass before a job is marked failed
    #[serde(default = "default_assessment_max_attempts")]
    pub assessment_max_attempts: u32,

    #[serde(default = "default_assessment_retry_backoff_ms")]
    pub assessment_retry_backoff_ms: u64,

    /// Concurrent claim-and-process loops per batch
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Processing jobs older than this are assumed orphaned and re-queued
    #[serde(default = "default_stale_claim_secs")]
    pub stale_claim_secs: u64,

    /// Download ceiling for evidence documents
    #[serde(default = "default_document_max_bytes")]
    pub document_max_bytes: u64,

    /// Characters of extracted text kept per document
    #[serde(default = "default_document_preview_chars")]
    pub document_preview_chars: usize,

    #[serde(default = "default_document_fetch_timeout_secs")]
    pub document_fetch_timeout_secs: u64,

    /// Run a worker pool inside the API server process
    #[serde(default = "default_embedded_workers")]
    pub embedded_workers: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_assessment_model() -> String {
    "@cf/meta/llama-3.1-8b-instruct".to_string()
}

fn default_assessment_timeout_secs() -> u64 {
    45
}

fn default_assessment_max_attempts() -> u32 {
    3
}

fn default_assessment_retry_backoff_ms() -> u64 {
    500
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_stale_claim_secs() -> u64 {
    900
}

fn default_document_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_document_preview_chars() -> usize {
    12_000
}

fn default_document_fetch_timeout_secs() -> u64 {
    20
}

fn default_embedded_workers() -> bool {
    true
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            assessment_timeout: Duration::from_secs(self.assessment_timeout_secs),
            max_attempts: self.assessment_max_attempts.max(1),
            retry_backoff: Duration::from_millis(self.assessment_retry_backoff_ms),
            worker_concurrency: self.worker_concurrency.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stale_claim_after: Duration::from_secs(self.stale_claim_secs),
            document_max_bytes: self.document_max_bytes,
            document_preview_chars: self.document_preview_chars,
            document_fetch_timeout: Duration::from_secs(self.document_fetch_timeout_secs),
        }
    }
}

/// Runtime knobs of the verification engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub assessment_timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub worker_concurrency: usize,
    pub poll_interval: Duration,
    pub stale_claim_after: Duration,
    pub document_max_bytes: u64,
    pub document_preview_chars: usize,
    pub document_fetch_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            assessment_timeout: Duration::from_secs(default_assessment_timeout_secs()),
            max_attempts: default_assessment_max_attempts(),
            retry_backoff: Duration::from_millis(default_assessment_retry_backoff_ms()),
            worker_concurrency: default_worker_concurrency(),
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            stale_claim_after: Duration::from_secs(default_stale_claim_secs()),
            document_max_bytes: default_document_max_bytes(),
            document_preview_chars: default_document_preview_chars(),
            document_fetch_timeout: Duration::from_secs(default_document_fetch_timeout_secs()),
        }
    }
}
