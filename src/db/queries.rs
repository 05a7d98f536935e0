use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::models::assessment::Assessment;
use crate::models::job::{Aspect, AspectCheck, JobStatus, VerificationJob};
use crate::models::score::AspectConfidences;

const JOB_COLUMNS: &str = "id, candidate_id, aspect, status, confidence, rationale, checks, \
     input_fingerprint, link_overlap_count, link_notes, used_external_search, attempts, \
     created_at, started_at, finished_at, updated_at";

fn decode_err(e: strum::ParseError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

fn row_to_job(r: &PgRow) -> Result<VerificationJob, sqlx::Error> {
    let aspect: String = r.try_get("aspect")?;
    let status: String = r.try_get("status")?;
    let checks: Json<Vec<AspectCheck>> = r.try_get("checks")?;

    Ok(VerificationJob {
        id: r.try_get("id")?,
        candidate_id: r.try_get("candidate_id")?,
        aspect: Aspect::from_str(&aspect).map_err(decode_err)?,
        status: JobStatus::from_str(&status).map_err(decode_err)?,
        confidence: r.try_get("confidence")?,
        rationale: r.try_get("rationale")?,
        checks: checks.0,
        input_fingerprint: r.try_get("input_fingerprint")?,
        link_overlap_count: r.try_get("link_overlap_count")?,
        link_notes: r.try_get("link_notes")?,
        used_external_search: r.try_get("used_external_search")?,
        attempts: r.try_get("attempts")?,
        created_at: r.try_get("created_at")?,
        started_at: r.try_get("started_at")?,
        finished_at: r.try_get("finished_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<VerificationJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM verification_jobs WHERE id = $1"
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// The queued or processing job for (candidate, aspect), if any.
pub async fn find_active_job(
    pool: &PgPool,
    candidate_id: Uuid,
    aspect: Aspect,
) -> Result<Option<VerificationJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM verification_jobs
        WHERE candidate_id = $1
          AND aspect = $2
          AND status IN ('queued', 'processing')
        LIMIT 1
        "#
    ))
    .bind(candidate_id)
    .bind(aspect.as_ref())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// The most recently finished succeeded job for (candidate, aspect).
pub async fn latest_succeeded_job(
    pool: &PgPool,
    candidate_id: Uuid,
    aspect: Aspect,
) -> Result<Option<VerificationJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM verification_jobs
        WHERE candidate_id = $1
          AND aspect = $2
          AND status = 'succeeded'
        ORDER BY finished_at DESC NULLS LAST, created_at DESC
        LIMIT 1
        "#
    ))
    .bind(candidate_id)
    .bind(aspect.as_ref())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// Insert a queued job unless an active one already exists for (candidate, aspect).
///
/// Returns `None` when the partial unique index rejected the row because a
/// concurrent caller got there first.
pub async fn insert_queued_job(
    pool: &PgPool,
    candidate_id: Uuid,
    aspect: Aspect,
    fingerprint: &str,
) -> Result<Option<VerificationJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO verification_jobs (id, candidate_id, aspect, status, input_fingerprint)
        VALUES ($1, $2, $3, 'queued', $4)
        ON CONFLICT (candidate_id, aspect) WHERE status IN ('queued', 'processing')
        DO NOTHING
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(candidate_id)
    .bind(aspect.as_ref())
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// Exclusively claim the oldest queued job.
///
/// The row is locked with `SKIP LOCKED` so concurrent workers never block on
/// or double-claim the same job; the transaction commits before any
/// external work starts.
pub async fn claim_next_queued_job(pool: &PgPool) -> Result<Option<VerificationJob>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let next: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id
        FROM verification_jobs
        WHERE status = 'queued'
        ORDER BY created_at ASC, id ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .fetch_optional(&mut *tx)
    .await?;

    let Some(job_id) = next else {
        tx.commit().await?;
        return Ok(None);
    };

    let row = sqlx::query(&format!(
        r#"
        UPDATE verification_jobs
        SET status = 'processing',
            started_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(job_id)
    .fetch_one(&mut *tx)
    .await?;

    let job = row_to_job(&row)?;
    tx.commit().await?;
    Ok(Some(job))
}

/// Store the fingerprint a job is being processed against.
///
/// Returns `false` when the stored fingerprint was already equal.
pub async fn set_job_fingerprint(
    pool: &PgPool,
    job_id: Uuid,
    fingerprint: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE verification_jobs
        SET input_fingerprint = $2,
            updated_at = NOW()
        WHERE id = $1
          AND input_fingerprint IS DISTINCT FROM $2
        "#,
    )
    .bind(job_id)
    .bind(fingerprint)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Link-overlap metadata recorded with a successful result.
#[derive(Debug, Clone, Default)]
pub struct LinkFindings {
    pub overlap_count: i32,
    pub notes: Option<String>,
}

/// Persist a successful assessment on a processing job.
pub async fn mark_job_succeeded(
    pool: &PgPool,
    job_id: Uuid,
    assessment: &Assessment,
    links: &LinkFindings,
    attempts: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE verification_jobs
        SET status = 'succeeded',
            confidence = $2,
            rationale = $3,
            checks = $4,
            link_overlap_count = $5,
            link_notes = $6,
            used_external_search = $7,
            attempts = $8,
            finished_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
          AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(assessment.confidence)
    .bind(&assessment.rationale)
    .bind(Json(&assessment.checks))
    .bind(links.overlap_count)
    .bind(links.notes.as_deref())
    .bind(assessment.used_external_search)
    .bind(attempts)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a processing job failed with a human-readable rationale.
pub async fn mark_job_failed(
    pool: &PgPool,
    job_id: Uuid,
    rationale: &str,
    attempts: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE verification_jobs
        SET status = 'failed',
            confidence = NULL,
            rationale = $2,
            attempts = $3,
            finished_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
          AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(rationale)
    .bind(attempts)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Put jobs stuck in `processing` for longer than `older_than` back in the queue.
pub async fn requeue_stale_processing(
    pool: &PgPool,
    older_than: Duration,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE verification_jobs
        SET status = 'queued',
            started_at = NULL,
            updated_at = NOW()
        WHERE status = 'processing'
          AND started_at < NOW() - make_interval(secs => $1)
        "#,
    )
    .bind(older_than.as_secs_f64())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Aspects with at least one succeeded job for the candidate.
pub async fn succeeded_aspects(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Vec<Aspect>, sqlx::Error> {
    let labels: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT aspect
        FROM verification_jobs
        WHERE candidate_id = $1
          AND status = 'succeeded'
        "#,
    )
    .bind(candidate_id)
    .fetch_all(pool)
    .await?;

    labels
        .iter()
        .map(|l| Aspect::from_str(l).map_err(decode_err))
        .collect()
}

/// Confidence of the latest succeeded job for each evidence aspect.
pub async fn latest_succeeded_confidences(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<AspectConfidences, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT ON (aspect) aspect, confidence
        FROM verification_jobs
        WHERE candidate_id = $1
          AND status = 'succeeded'
          AND aspect IN ('resume', 'transcript', 'project_links')
        ORDER BY aspect, finished_at DESC NULLS LAST, created_at DESC
        "#,
    )
    .bind(candidate_id)
    .fetch_all(pool)
    .await?;

    let mut confidences = AspectConfidences::default();
    for r in rows {
        let aspect: String = r.try_get("aspect")?;
        let confidence: Option<f64> = r.try_get("confidence")?;
        match Aspect::from_str(&aspect).map_err(decode_err)? {
            Aspect::Resume => confidences.resume = confidence,
            Aspect::Transcript => confidences.transcript = confidence,
            Aspect::ProjectLinks => confidences.project_links = confidence,
            Aspect::FullProfile => {}
        }
    }
    Ok(confidences)
}

/// Most recently created job per aspect for a candidate.
pub async fn latest_jobs_by_aspect(
    pool: &PgPool,
    candidate_id: Uuid,
) -> Result<Vec<VerificationJob>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT DISTINCT ON (aspect) {JOB_COLUMNS}
        FROM verification_jobs
        WHERE candidate_id = $1
        ORDER BY aspect, created_at DESC
        "#
    ))
    .bind(candidate_id)
    .fetch_all(pool)
    .await?;

    let mut jobs = rows.iter().map(row_to_job).collect::<Result<Vec<_>, _>>()?;
    jobs.sort_by_key(|j| j.aspect as u8);
    Ok(jobs)
}

/// Number of jobs waiting to be claimed.
pub async fn queue_depth(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM verification_jobs WHERE status = 'queued'")
        .fetch_one(pool)
        .await
}
