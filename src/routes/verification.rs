use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{candidate_queries, queries, score_queries};
use crate::models::job::{Aspect, VerificationJob};
use crate::models::verification::VerificationStatusResponse;
use crate::services::queue::{self, EnqueueOutcome, QueueError};
use crate::services::readiness::{self, ReadinessReport};

/// POST /api/v1/candidates/{candidate_id}/verification
///
/// Called after a candidate's evidence changes. Queues every aspect that is
/// ready and not already covered, then wakes the worker pool.
pub async fn trigger_verification(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ReadinessReport>), StatusCode> {
    let report = readiness::ensure_readiness(&state, candidate_id)
        .await
        .map_err(|e| {
            tracing::error!(candidate_id = %candidate_id, error = %e, "Readiness evaluation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !report.candidate_found {
        return Err(StatusCode::NOT_FOUND);
    }

    let status = if report.queued().is_empty() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(report)))
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub outcome: &'static str,
    pub job: VerificationJob,
}

impl From<EnqueueOutcome> for EnqueueResponse {
    fn from(outcome: EnqueueOutcome) -> Self {
        match outcome {
            EnqueueOutcome::Queued(job) => Self { outcome: "queued", job },
            EnqueueOutcome::AlreadyActive(job) => Self {
                outcome: "already_active",
                job,
            },
            EnqueueOutcome::UpToDate(job) => Self {
                outcome: "up_to_date",
                job,
            },
        }
    }
}

/// POST /api/v1/candidates/{candidate_id}/verification/{aspect} — request one aspect.
pub async fn request_aspect(
    State(state): State<AppState>,
    Path((candidate_id, aspect)): Path<(Uuid, Aspect)>,
) -> Result<(StatusCode, Json<EnqueueResponse>), StatusCode> {
    let outcome = queue::enqueue_aspect(&state, candidate_id, aspect)
        .await
        .map_err(|e| match e {
            QueueError::CandidateNotFound(_) => StatusCode::NOT_FOUND,
            QueueError::PrerequisitesMissing { .. } => StatusCode::CONFLICT,
            e => {
                tracing::error!(candidate_id = %candidate_id, aspect = %aspect, error = %e, "Enqueue failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    let status = if outcome.is_queued() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.into())))
}

/// GET /api/v1/candidates/{candidate_id}/verification — latest job per aspect and the aggregate.
pub async fn get_verification_status(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<VerificationStatusResponse>, StatusCode> {
    let internal = |e: sqlx::Error| {
        tracing::error!(candidate_id = %candidate_id, error = %e, "Failed to load verification status");
        StatusCode::INTERNAL_SERVER_ERROR
    };

    candidate_queries::get_candidate(&state.db, candidate_id)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let jobs = queries::latest_jobs_by_aspect(&state.db, candidate_id)
        .await
        .map_err(internal)?;
    let aggregate = score_queries::get_trust_score(&state.db, candidate_id)
        .await
        .map_err(internal)?;

    Ok(Json(VerificationStatusResponse {
        candidate_id,
        jobs,
        aggregate,
    }))
}
