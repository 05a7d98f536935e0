use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::models::assessment::{AssessmentRequest, AssessmentResponse, ResponseError};

/// Black-box scoring service that judges candidate evidence.
#[async_trait]
pub trait AssessmentService: Send + Sync {
    async fn assess(&self, request: &AssessmentRequest) -> Result<AssessmentResponse, AssessmentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("assessment timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("assessment service returned status {0}")]
    Status(u16),

    #[error("failed to parse assessment response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid assessment response: {0}")]
    Invalid(#[from] ResponseError),

    #[error("assessment service unavailable: {0}")]
    Unavailable(String),
}

impl AssessmentError {
    /// Whether another attempt within the same processing pass may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AssessmentError::Unavailable(_))
    }
}

/// Client for a Cloudflare Workers AI text-generation model.
pub struct WorkersAiAssessor {
    http: Client,
    credentials: Option<(String, String)>,
    model: String,
}

#[derive(Deserialize)]
struct TextGenerationResponse {
    result: TextGenerationResult,
}

#[derive(Deserialize)]
struct TextGenerationResult {
    response: String,
}

const SYSTEM_PROMPT: &str = concat!(
    "You verify evidence submitted by job candidates. ",
    "Given structured profile fields, document text previews, submitted links and duplicate-link hints, ",
    "judge how credible and internally consistent the evidence is. ",
    "Return ONLY valid JSON of the form ",
    "{\"overall_confidence\": number 0..1, \"summary\": string, ",
    "\"checks\": [{\"aspect\": string, \"confidence\": number 0..1, \"rationale\": string}], ",
    "\"used_external_search\": boolean}."
);

impl WorkersAiAssessor {
    /// Without both credentials every call reports the service as unavailable.
    pub fn new(account_id: Option<String>, api_token: Option<String>, model: String) -> Self {
        let credentials = match (account_id, api_token) {
            (Some(account), Some(token)) if !account.is_empty() && !token.is_empty() => {
                Some((account, token))
            }
            _ => None,
        };

        Self {
            http: Client::new(),
            credentials,
            model,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl AssessmentService for WorkersAiAssessor {
    async fn assess(&self, request: &AssessmentRequest) -> Result<AssessmentResponse, AssessmentError> {
        let Some((account_id, api_token)) = &self.credentials else {
            return Err(AssessmentError::Unavailable(
                "no Workers AI credentials configured".to_string(),
            ));
        };

        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            account_id, self.model
        );

        let request_body = serde_json::json!({
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": serde_json::to_string(request)? },
            ],
            "max_tokens": 1024,
            "temperature": 0.1
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_token)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssessmentError::Status(status.as_u16()));
        }

        let generation: TextGenerationResponse = response.json().await?;
        parse_model_output(&generation.result.response)
    }
}

/// Parse the JSON object out of free-form model output.
///
/// Models sometimes wrap the object in a code fence or add a preamble; the
/// outermost `{ ... }` span is taken.
pub fn parse_model_output(text: &str) -> Result<AssessmentResponse, AssessmentError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &text[s..=e],
        _ => text,
    };
    Ok(serde_json::from_str(json)?)
}
