use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::score::{AspectConfidences, CandidateAggregateScore};

/// Upsert the derived aggregate score for a candidate.
pub async fn upsert_trust_score(
    pool: &PgPool,
    candidate_id: Uuid,
    score: Option<f64>,
    confidences: &AspectConfidences,
) -> Result<CandidateAggregateScore, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO candidate_trust_scores
            (candidate_id, score, resume_confidence, transcript_confidence, project_links_confidence)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (candidate_id) DO UPDATE
        SET score = EXCLUDED.score,
            resume_confidence = EXCLUDED.resume_confidence,
            transcript_confidence = EXCLUDED.transcript_confidence,
            project_links_confidence = EXCLUDED.project_links_confidence,
            updated_at = NOW()
        RETURNING updated_at
        "#,
    )
    .bind(candidate_id)
    .bind(score)
    .bind(confidences.resume)
    .bind(confidences.transcript)
    .bind(confidences.project_links)
    .fetch_one(pool)
    .await?;

    Ok(CandidateAggregateScore {
        candidate_id,
        score,
        confidences: *confidences,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Read the last computed aggregate score.
pub async fn get_trust_score(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Option<CandidateAggregateScore>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT candidate_id, score, resume_confidence, transcript_confidence,
               project_links_confidence, updated_at
        FROM candidate_trust_scores
        WHERE candidate_id = $1
        "#,
    )
    .bind(candidate_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(CandidateAggregateScore {
            candidate_id: r.try_get("candidate_id")?,
            score: r.try_get("score")?,
            confidences: AspectConfidences {
                resume: r.try_get("resume_confidence")?,
                transcript: r.try_get("transcript_confidence")?,
                project_links: r.try_get("project_links_confidence")?,
            },
            updated_at: r.try_get("updated_at")?,
        })
    })
    .transpose()
}
