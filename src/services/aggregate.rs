use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{queries, score_queries};
use crate::models::score::{AspectConfidences, CandidateAggregateScore};

/// Unweighted mean of the three evidence confidences, or `None` if any is missing.
pub fn aggregate_score(confidences: &AspectConfidences) -> Option<f64> {
    let resume = confidences.resume?;
    let transcript = confidences.transcript?;
    let project_links = confidences.project_links?;
    Some((resume + transcript + project_links) / 3.0)
}

/// Recompute and persist a candidate's aggregate score from their latest succeeded jobs.
pub async fn recompute(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<CandidateAggregateScore, sqlx::Error> {
    let confidences = queries::latest_succeeded_confidences(pool, candidate_id).await?;
    let score = aggregate_score(&confidences);

    tracing::debug!(
        candidate_id = %candidate_id,
        score = ?score,
        "Aggregate score recomputed"
    );

    score_queries::upsert_trust_score(pool, candidate_id, score, &confidences).await
}
