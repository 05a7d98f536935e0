use serde::Serialize;
use uuid::Uuid;

use crate::models::job::VerificationJob;
use crate::models::score::CandidateAggregateScore;

/// Response for querying a candidate's verification state.
#[derive(Debug, Serialize)]
pub struct VerificationStatusResponse {
    pub candidate_id: Uuid,
    /// Most recent job per aspect, in aspect order.
    pub jobs: Vec<VerificationJob>,
    pub aggregate: Option<CandidateAggregateScore>,
}
