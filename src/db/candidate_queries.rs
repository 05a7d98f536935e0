use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::candidate::{Candidate, CandidateEvidence, DocumentKind, EvidenceDocument};

/// Fetch a candidate record.
pub async fn get_candidate(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Option<Candidate>, sqlx::Error> {
    sqlx::query_as::<_, Candidate>(
        r#"
        SELECT id, full_name, email, headline, location, skills, experience_summary,
               years_experience, education, projects, portfolio_links, updated_at
        FROM candidates
        WHERE id = $1
        "#,
    )
    .bind(candidate_id)
    .fetch_optional(pool)
    .await
}

/// List a candidate's evidence documents, oldest first.
pub async fn list_documents(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Vec<EvidenceDocument>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, candidate_id, kind, file_name, url, checksum, content_type, byte_size
        FROM candidate_documents
        WHERE candidate_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(candidate_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            let kind: String = r.try_get("kind")?;
            Ok(EvidenceDocument {
                id: r.try_get("id")?,
                candidate_id: r.try_get("candidate_id")?,
                kind: DocumentKind::from_str(&kind).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
                file_name: r.try_get("file_name")?,
                url: r.try_get("url")?,
                checksum: r.try_get("checksum")?,
                content_type: r.try_get("content_type")?,
                byte_size: r.try_get("byte_size")?,
            })
        })
        .collect()
}

/// Load a candidate together with their documents; `None` if the candidate is gone.
pub async fn load_evidence(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Option<CandidateEvidence>, sqlx::Error> {
    let Some(candidate) = get_candidate(pool, candidate_id).await? else {
        return Ok(None);
    };
    let documents = list_documents(pool, candidate_id).await?;
    Ok(Some(CandidateEvidence::new(candidate, documents)))
}

/// Other candidates whose textual evidence matches `pattern` (an escaped `ILIKE` pattern).
///
/// Searches profile text fields and cached document text, excluding `candidate_id`.
pub async fn find_link_mentions(
    pool: &PgPool,
    candidate_id: Uuid,
    pattern: &str,
    limit: i64,
) -> Result<Vec<(Uuid, String)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.full_name
        FROM candidates c
        WHERE c.id <> $1
          AND (
              c.projects ILIKE $2
              OR c.experience_summary ILIKE $2
              OR array_to_string(c.portfolio_links, ' ') ILIKE $2
              OR EXISTS (
                  SELECT 1
                  FROM candidate_documents d
                  JOIN document_text_cache t
                    ON t.document_id = d.id AND t.checksum = d.checksum
                  WHERE d.candidate_id = c.id
                    AND t.text_content ILIKE $2
              )
          )
        ORDER BY c.full_name ASC, c.id ASC
        LIMIT $3
        "#,
    )
    .bind(candidate_id)
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| Ok((r.try_get("id")?, r.try_get("full_name")?)))
        .collect()
}
