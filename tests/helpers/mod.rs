//! Test helper utilities shared by integration and E2E tests

#![allow(dead_code)]

use async_trait::async_trait;
use evidence_verify::{
    app_state::AppState,
    config::EngineSettings,
    db,
    models::assessment::{AssessmentRequest, AssessmentResponse, ReportedCheck},
    services::{
        assessment::{AssessmentError, AssessmentService},
        dispatch::{DispatchReceiver, Dispatcher},
        fetch::{DocumentFetcher, FetchedDocument},
    },
};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Always answers with the same confidence and one check for the job's own aspect.
pub struct FixedAssessor {
    pub confidence: f64,
    pub calls: AtomicU32,
}

impl FixedAssessor {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AssessmentService for FixedAssessor {
    async fn assess(&self, request: &AssessmentRequest) -> Result<AssessmentResponse, AssessmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AssessmentResponse {
            overall_confidence: self.confidence,
            summary: format!("Fixed assessment of {}", request.aspect),
            checks: vec![ReportedCheck {
                aspect: request.aspect.to_string(),
                confidence: self.confidence,
                rationale: "consistent".to_string(),
            }],
            used_external_search: Some(false),
        })
    }
}

/// Never answers within any reasonable timeout.
pub struct HangingAssessor {
    pub calls: AtomicU32,
}

impl HangingAssessor {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AssessmentService for HangingAssessor {
    async fn assess(&self, _: &AssessmentRequest) -> Result<AssessmentResponse, AssessmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_secs(3600)).await;
        Err(AssessmentError::Status(504))
    }
}

/// Serves the same text body for every document URL, counting fetches.
pub struct StaticFetcher {
    pub body: &'static str,
    pub fetches: AtomicU32,
}

impl StaticFetcher {
    pub fn new(body: &'static str) -> Self {
        Self {
            body,
            fetches: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str, _max_bytes: u64) -> Option<FetchedDocument> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Some(FetchedDocument {
            bytes: self.body.as_bytes().to_vec(),
            content_type: Some("text/plain".to_string()),
            byte_size: self.body.len() as u64,
        })
    }
}

/// Serves a body of `size` bytes whatever ceiling the caller asks for.
pub struct OversizedFetcher {
    pub size: usize,
    pub fetches: AtomicU32,
}

impl OversizedFetcher {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            fetches: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DocumentFetcher for OversizedFetcher {
    async fn fetch(&self, _url: &str, _max_bytes: u64) -> Option<FetchedDocument> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Some(FetchedDocument {
            bytes: vec![b'a'; self.size],
            content_type: Some("text/plain".to_string()),
            byte_size: self.size as u64,
        })
    }
}

/// Settings tuned so retry tests finish in milliseconds.
pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        assessment_timeout: Duration::from_millis(50),
        retry_backoff: Duration::from_millis(5),
        poll_interval: Duration::from_millis(50),
        ..EngineSettings::default()
    }
}

/// Connect to `DATABASE_URL`, apply migrations and build state around the given fakes.
pub async fn test_state(
    assessor: Arc<dyn AssessmentService>,
    fetcher: Arc<dyn DocumentFetcher>,
) -> (AppState, DispatchReceiver) {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = db::init_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let (dispatcher, receiver) = Dispatcher::channel();
    let state = AppState::new(pool, assessor, fetcher, dispatcher, fast_settings());
    (state, receiver)
}

/// Job row as exposed by GET /api/v1/candidates/{id}/verification
#[derive(Debug, Deserialize)]
pub struct JobView {
    pub id: Uuid,
    pub aspect: String,
    pub status: String,
    pub confidence: Option<f64>,
    pub rationale: Option<String>,
    pub attempts: i32,
}

#[derive(Debug, Deserialize)]
pub struct AggregateView {
    pub score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusView {
    pub candidate_id: Uuid,
    pub jobs: Vec<JobView>,
    pub aggregate: Option<AggregateView>,
}

/// Ask the server to evaluate a candidate's readiness.
pub async fn trigger_verification(
    client: &reqwest::Client,
    base_url: &str,
    candidate_id: Uuid,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let response = client
        .post(format!("{}/api/v1/candidates/{}/verification", base_url, candidate_id))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Trigger failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json().await?)
}

pub async fn fetch_status(
    client: &reqwest::Client,
    base_url: &str,
    candidate_id: Uuid,
) -> Result<StatusView, Box<dyn std::error::Error>> {
    let response = client
        .get(format!("{}/api/v1/candidates/{}/verification", base_url, candidate_id))
        .send()
        .await?;

    if !response.status().is_success() {
        let error_text = response.text().await?;
        return Err(format!("Status check failed: {}", error_text).into());
    }

    Ok(response.json::<StatusView>().await?)
}

/// Poll until the latest job for `aspect` is terminal (with timeout)
pub async fn wait_for_aspect(
    client: &reqwest::Client,
    base_url: &str,
    candidate_id: Uuid,
    aspect: &str,
    timeout_secs: u64,
) -> Result<JobView, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let status = fetch_status(client, base_url, candidate_id).await?;

        if let Some(job) = status.jobs.into_iter().find(|j| j.aspect == aspect) {
            match job.status.as_str() {
                "succeeded" | "failed" => return Ok(job),
                "queued" | "processing" => {}
                other => return Err(format!("Unknown job status: {}", other).into()),
            }
        }

        if attempt % 10 == 0 && attempt > 0 {
            println!("  ... still waiting for {} (attempt {}/{})", aspect, attempt, max_attempts);
        }
        sleep(Duration::from_millis(500)).await;
    }

    Err(format!("{} did not finish within {} seconds", aspect, timeout_secs).into())
}
