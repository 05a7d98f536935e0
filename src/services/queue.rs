use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{candidate_queries, queries};
use crate::models::job::{Aspect, VerificationJob};
use crate::services::{readiness, snapshot};

/// Lost insert races are re-read this many times before giving up.
const MAX_ENQUEUE_ROUNDS: usize = 3;

/// Result of asking for an aspect to be (re)verified.
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// A new queued job was created.
    Queued(VerificationJob),
    /// A queued or processing job already covers this aspect.
    AlreadyActive(VerificationJob),
    /// The latest succeeded job was computed from identical inputs.
    UpToDate(VerificationJob),
}

impl EnqueueOutcome {
    pub fn job(&self) -> &VerificationJob {
        match self {
            EnqueueOutcome::Queued(job)
            | EnqueueOutcome::AlreadyActive(job)
            | EnqueueOutcome::UpToDate(job) => job,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("candidate {0} not found")]
    CandidateNotFound(Uuid),

    #[error("full profile verification for candidate {candidate_id} requires succeeded {missing:?} verification first")]
    PrerequisitesMissing {
        candidate_id: Uuid,
        missing: Vec<Aspect>,
    },

    #[error("could not settle an active {aspect} job for candidate {candidate_id}")]
    Contended { candidate_id: Uuid, aspect: Aspect },
}

/// Enqueue a job for (candidate, aspect) unless one is active or the inputs are unchanged.
///
/// Relies on the partial unique index over active jobs: concurrent callers
/// either insert the single active job or observe it.
pub async fn enqueue(
    pool: &PgPool,
    candidate_id: Uuid,
    aspect: Aspect,
    fingerprint: &str,
) -> Result<EnqueueOutcome, QueueError> {
    for _ in 0..MAX_ENQUEUE_ROUNDS {
        if let Some(active) = queries::find_active_job(pool, candidate_id, aspect).await? {
            return Ok(EnqueueOutcome::AlreadyActive(active));
        }

        if let Some(latest) = queries::latest_succeeded_job(pool, candidate_id, aspect).await? {
            if latest.input_fingerprint.as_deref() == Some(fingerprint) {
                tracing::debug!(
                    candidate_id = %candidate_id,
                    aspect = %aspect,
                    job_id = %latest.id,
                    "Evidence unchanged since last verification"
                );
                return Ok(EnqueueOutcome::UpToDate(latest));
            }
        }

        match queries::insert_queued_job(pool, candidate_id, aspect, fingerprint).await? {
            Some(job) => {
                metrics::counter!("verification_jobs_enqueued_total", "aspect" => aspect.to_string())
                    .increment(1);
                tracing::info!(
                    job_id = %job.id,
                    candidate_id = %candidate_id,
                    aspect = %aspect,
                    "Verification job queued"
                );
                return Ok(EnqueueOutcome::Queued(job));
            }
            None => {
                // Another caller inserted first; its job may already have finished.
                if let Some(active) = queries::find_active_job(pool, candidate_id, aspect).await? {
                    return Ok(EnqueueOutcome::AlreadyActive(active));
                }
            }
        }
    }

    Err(QueueError::Contended {
        candidate_id,
        aspect,
    })
}

/// Enqueue a single aspect on demand, computing its fingerprint from current evidence.
///
/// `full_profile` stays gated on the three evidence aspects having succeeded.
pub async fn enqueue_aspect(
    state: &AppState,
    candidate_id: Uuid,
    aspect: Aspect,
) -> Result<EnqueueOutcome, QueueError> {
    let evidence = candidate_queries::load_evidence(&state.db, candidate_id)
        .await?
        .ok_or(QueueError::CandidateNotFound(candidate_id))?;

    if aspect == Aspect::FullProfile {
        let succeeded = queries::succeeded_aspects(&state.db, candidate_id).await?;
        if !readiness::full_profile_eligible(&succeeded) {
            let missing = Aspect::EVIDENCE
                .into_iter()
                .filter(|a| !succeeded.contains(a))
                .collect();
            return Err(QueueError::PrerequisitesMissing {
                candidate_id,
                missing,
            });
        }
    }

    let fingerprint = snapshot::fingerprint_for(aspect, &evidence);
    let outcome = enqueue(&state.db, candidate_id, aspect, &fingerprint).await?;
    if outcome.is_queued() {
        state.dispatcher.notify();
    }
    Ok(outcome)
}

/// Return jobs whose worker vanished mid-processing to the queue.
pub async fn recover_stale_claims(pool: &PgPool, older_than: Duration) -> Result<u64, QueueError> {
    let recovered = queries::requeue_stale_processing(pool, older_than).await?;
    if recovered > 0 {
        tracing::warn!(
            recovered,
            lease_secs = older_than.as_secs(),
            "Requeued verification jobs abandoned mid-processing"
        );
    }
    Ok(recovered)
}
