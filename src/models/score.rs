use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Latest succeeded confidence for each evidence aspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AspectConfidences {
    pub resume: Option<f64>,
    pub transcript: Option<f64>,
    pub project_links: Option<f64>,
}

/// Profile-level trust score derived from the evidence aspects.
///
/// `score` stays `None` until every evidence aspect has succeeded at least
/// once; "not yet assessable" is distinct from a low score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAggregateScore {
    pub candidate_id: Uuid,
    pub score: Option<f64>,
    pub confidences: AspectConfidences,
    pub updated_at: DateTime<Utc>,
}
