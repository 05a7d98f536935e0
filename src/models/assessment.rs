use garde::Validate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::candidate::DocumentKind;
use crate::models::job::{Aspect, AspectCheck};

/// Confidence assigned when the assessment service cannot be reached at all.
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Another candidate whose evidence mentions one of the submitted links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkOverlap {
    pub link: String,
    pub other_candidate_id: Uuid,
    pub other_candidate_name: String,
}

/// Evidence file as presented to the assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: Uuid,
    pub kind: DocumentKind,
    pub file_name: String,
    /// Extracted text preview; `None` when the file could not be read.
    pub text_preview: Option<String>,
}

/// Payload sent to the assessment service.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRequest {
    pub aspect: Aspect,
    pub allowed_aspects: Vec<Aspect>,
    pub candidate_fields: serde_json::Value,
    pub documents: Vec<DocumentSummary>,
    pub links: Vec<String>,
    pub duplicate_link_hints: Vec<LinkOverlap>,
    pub instruction: String,
}

impl AssessmentRequest {
    pub fn new(
        aspect: Aspect,
        candidate_fields: serde_json::Value,
        documents: Vec<DocumentSummary>,
        links: Vec<String>,
        duplicate_link_hints: Vec<LinkOverlap>,
    ) -> Self {
        let allowed_aspects = aspect.allowed_check_labels().to_vec();
        let labels = allowed_aspects
            .iter()
            .map(|a| a.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        let instruction = format!(
            "Assess only the following aspects of the candidate's evidence: {labels}. \
             Report one check per assessed aspect using exactly these labels and do not comment on anything else. \
             Duplicate link hints indicate links also present in other candidates' evidence; weigh them as a signal, not as proof."
        );

        Self {
            aspect,
            allowed_aspects,
            candidate_fields,
            documents,
            links,
            duplicate_link_hints,
            instruction,
        }
    }
}

/// Raw per-aspect finding as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReportedCheck {
    #[garde(length(min = 1, max = 64))]
    pub aspect: String,

    #[garde(skip)]
    pub confidence: f64,

    #[garde(length(max = 4000))]
    pub rationale: String,
}

/// Raw response from the assessment service, before clamping and label filtering.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssessmentResponse {
    #[garde(skip)]
    pub overall_confidence: f64,

    #[garde(length(max = 8000))]
    pub summary: String,

    #[serde(default)]
    #[garde(length(max = 32), dive)]
    pub checks: Vec<ReportedCheck>,

    #[serde(default)]
    #[garde(skip)]
    pub used_external_search: Option<bool>,
}

/// Validated outcome ready to be persisted on a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub confidence: f64,
    pub rationale: String,
    pub checks: Vec<AspectCheck>,
    pub used_external_search: bool,
}

impl Assessment {
    /// Stand-in result used when the service is entirely unavailable.
    pub fn neutral(reason: &str) -> Self {
        Self {
            confidence: NEUTRAL_CONFIDENCE,
            rationale: format!(
                "Assessment service unavailable ({reason}); neutral confidence assigned without evidentiary review"
            ),
            checks: Vec::new(),
            used_external_search: false,
        }
    }
}

/// Why a response could not be turned into an [`Assessment`].
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("response failed validation: {0}")]
    Validation(#[from] garde::Report),

    #[error("overall confidence is not a finite number")]
    NonFiniteConfidence,
}

pub fn clamp_confidence(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

impl AssessmentResponse {
    /// Validate the response for a job of `aspect`.
    ///
    /// Confidences are clamped to `[0, 1]`. Checks with unknown labels, labels
    /// outside the job's scope, or non-finite confidences are dropped.
    pub fn into_assessment(self, aspect: Aspect) -> Result<Assessment, ResponseError> {
        self.validate()?;

        if !self.overall_confidence.is_finite() {
            return Err(ResponseError::NonFiniteConfidence);
        }

        let allowed = aspect.allowed_check_labels();
        let checks = self
            .checks
            .into_iter()
            .filter_map(|check| {
                let label = Aspect::from_str(check.aspect.trim()).ok();
                match label {
                    Some(label) if allowed.contains(&label) && check.confidence.is_finite() => {
                        Some(AspectCheck {
                            aspect: label,
                            confidence: clamp_confidence(check.confidence),
                            rationale: check.rationale,
                        })
                    }
                    _ => {
                        tracing::debug!(
                            aspect = %aspect,
                            label = %check.aspect,
                            "Dropping out-of-scope assessment check"
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(Assessment {
            confidence: clamp_confidence(self.overall_confidence),
            rationale: self.summary,
            checks,
            used_external_search: self.used_external_search.unwrap_or(false),
        })
    }
}
