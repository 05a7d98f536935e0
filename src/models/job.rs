use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Verification scope of a job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Aspect {
    Resume,
    Transcript,
    ProjectLinks,
    FullProfile,
}

impl Aspect {
    /// The three evidence aspects whose results feed the aggregate score.
    pub const EVIDENCE: [Aspect; 3] = [Aspect::Resume, Aspect::Transcript, Aspect::ProjectLinks];

    /// Check labels an assessment may report for a job of this aspect.
    pub fn allowed_check_labels(self) -> &'static [Aspect] {
        match self {
            Aspect::Resume => &[Aspect::Resume],
            Aspect::Transcript => &[Aspect::Transcript],
            Aspect::ProjectLinks => &[Aspect::ProjectLinks],
            Aspect::FullProfile => &[
                Aspect::Resume,
                Aspect::Transcript,
                Aspect::ProjectLinks,
                Aspect::FullProfile,
            ],
        }
    }
}

/// Status of a verification job in the durable queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

/// One per-aspect finding reported by the assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectCheck {
    pub aspect: Aspect,
    pub confidence: f64,
    pub rationale: String,
}

/// A persisted verification job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationJob {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub aspect: Aspect,
    pub status: JobStatus,
    pub confidence: Option<f64>,
    pub rationale: Option<String>,
    pub checks: Vec<AspectCheck>,
    pub input_fingerprint: Option<String>,
    pub link_overlap_count: i32,
    pub link_notes: Option<String>,
    pub used_external_search: bool,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
