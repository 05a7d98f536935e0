use futures::future::join_all;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::config::EngineSettings;
use crate::db::queries::{self, LinkFindings};
use crate::db::candidate_queries;
use crate::models::assessment::{Assessment, AssessmentRequest, DocumentSummary};
use crate::models::candidate::{CandidateEvidence, EvidenceDocument};
use crate::models::job::{Aspect, VerificationJob};
use crate::services::aggregate;
use crate::services::assessment::{AssessmentError, AssessmentService};
use crate::services::links;
use crate::services::queue::QueueError;
use crate::services::readiness;
use crate::services::snapshot;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// How a claimed job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded {
        job_id: Uuid,
        aspect: Aspect,
        confidence: f64,
    },
    Failed {
        job_id: Uuid,
        aspect: Aspect,
        rationale: String,
    },
    /// The job left `processing` before the result was written (stale-claim recovery).
    Discarded { job_id: Uuid, aspect: Aspect },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl From<&EngineSettings> for RetryPolicy {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            timeout: settings.assessment_timeout,
            backoff: settings.retry_backoff,
        }
    }
}

/// Attempts spent on an assessment and what came of them.
#[derive(Debug)]
pub struct AssessmentRun {
    pub attempts: u32,
    pub result: Result<Assessment, AssessmentError>,
}

/// Call the assessment service, retrying transient failures.
///
/// Each attempt is bounded by `policy.timeout`. An unavailable service is
/// not retried and yields the neutral assessment instead of an error.
pub async fn assess_with_retries(
    service: &dyn AssessmentService,
    request: &AssessmentRequest,
    policy: &RetryPolicy,
) -> AssessmentRun {
    let mut attempts = 0;

    loop {
        attempts += 1;
        let started = Instant::now();

        let result = match tokio::time::timeout(policy.timeout, service.assess(request)).await {
            Ok(Ok(response)) => response
                .into_assessment(request.aspect)
                .map_err(AssessmentError::from),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AssessmentError::Timeout(policy.timeout)),
        };

        metrics::counter!("verification_assessment_attempts_total", "aspect" => request.aspect.to_string())
            .increment(1);
        metrics::histogram!("verification_assessment_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(assessment) => {
                return AssessmentRun {
                    attempts,
                    result: Ok(assessment),
                }
            }
            Err(AssessmentError::Unavailable(reason)) => {
                tracing::warn!(
                    aspect = %request.aspect,
                    reason = %reason,
                    "Assessment service unavailable, using neutral confidence"
                );
                return AssessmentRun {
                    attempts,
                    result: Ok(Assessment::neutral(&reason)),
                };
            }
            Err(e) if e.is_retryable() && attempts < policy.max_attempts => {
                tracing::warn!(
                    aspect = %request.aspect,
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Assessment attempt failed, retrying"
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => {
                return AssessmentRun {
                    attempts,
                    result: Err(e),
                }
            }
        }
    }
}

/// Links are part of the assessed scope only for these aspects.
fn links_in_scope(aspect: Aspect) -> bool {
    matches!(aspect, Aspect::ProjectLinks | Aspect::FullProfile)
}

async fn build_request(
    state: &AppState,
    aspect: Aspect,
    evidence: &CandidateEvidence,
) -> Result<(AssessmentRequest, LinkFindings), sqlx::Error> {
    let cache = state.document_cache();
    let documents: Vec<&EvidenceDocument> = evidence
        .documents_of(snapshot::document_kinds(aspect))
        .collect();

    let texts = join_all(documents.iter().map(|d| cache.get_text(d))).await;
    let summaries: Vec<DocumentSummary> = documents
        .iter()
        .zip(texts)
        .map(|(d, text)| DocumentSummary {
            document_id: d.id,
            kind: d.kind,
            file_name: d.file_name.clone(),
            text_preview: text,
        })
        .collect();

    let (submitted_links, overlaps) = if links_in_scope(aspect) {
        let from_texts: Vec<Vec<String>> = summaries
            .iter()
            .filter_map(|s| s.text_preview.as_deref())
            .map(links::extract_links)
            .collect();
        let merged = links::merge_links(
            std::iter::once(evidence.links.as_slice())
                .chain(from_texts.iter().map(Vec::as_slice)),
        );
        let overlaps = links::find_overlaps(&state.db, evidence.candidate.id, &merged).await?;
        (merged, overlaps)
    } else {
        (Vec::new(), Vec::new())
    };

    let findings = LinkFindings {
        overlap_count: overlaps.len() as i32,
        notes: links::overlap_notes(&overlaps),
    };
    let request = AssessmentRequest::new(
        aspect,
        snapshot::candidate_fields(aspect, evidence),
        summaries,
        submitted_links,
        overlaps,
    );

    Ok((request, findings))
}

/// Process one claimed job through to a terminal status.
pub async fn process_job(state: &AppState, job: &VerificationJob) -> Result<JobOutcome, WorkerError> {
    let Some(evidence) = candidate_queries::load_evidence(&state.db, job.candidate_id).await? else {
        let rationale = format!(
            "Candidate {} no longer exists; verification abandoned",
            job.candidate_id
        );
        queries::mark_job_failed(&state.db, job.id, &rationale, 0).await?;
        metrics::counter!("verification_jobs_failed_total", "aspect" => job.aspect.to_string())
            .increment(1);
        tracing::warn!(job_id = %job.id, candidate_id = %job.candidate_id, "Candidate missing, job failed");
        return Ok(JobOutcome::Failed {
            job_id: job.id,
            aspect: job.aspect,
            rationale,
        });
    };

    let fingerprint = snapshot::fingerprint_for(job.aspect, &evidence);
    if queries::set_job_fingerprint(&state.db, job.id, &fingerprint).await? {
        tracing::debug!(job_id = %job.id, "Evidence changed since the job was queued");
    }

    let (request, findings) = build_request(state, job.aspect, &evidence).await?;
    let policy = RetryPolicy::from(state.settings.as_ref());
    let run = assess_with_retries(state.assessor.as_ref(), &request, &policy).await;
    let attempts = run.attempts as i32;

    match run.result {
        Ok(assessment) => {
            let written =
                queries::mark_job_succeeded(&state.db, job.id, &assessment, &findings, attempts)
                    .await?;
            if !written {
                tracing::warn!(job_id = %job.id, "Job no longer processing, result discarded");
                return Ok(JobOutcome::Discarded {
                    job_id: job.id,
                    aspect: job.aspect,
                });
            }

            metrics::counter!("verification_jobs_succeeded_total", "aspect" => job.aspect.to_string())
                .increment(1);
            tracing::info!(
                job_id = %job.id,
                candidate_id = %job.candidate_id,
                aspect = %job.aspect,
                confidence = assessment.confidence,
                attempts,
                link_overlaps = findings.overlap_count,
                "Verification job succeeded"
            );

            aggregate::recompute(&state.db, job.candidate_id).await?;
            readiness::ensure_readiness(state, job.candidate_id).await?;

            Ok(JobOutcome::Succeeded {
                job_id: job.id,
                aspect: job.aspect,
                confidence: assessment.confidence,
            })
        }
        Err(e) => {
            let rationale = format!("Assessment failed after {} attempts: {}", run.attempts, e);
            if !queries::mark_job_failed(&state.db, job.id, &rationale, attempts).await? {
                tracing::warn!(job_id = %job.id, "Job no longer processing, failure discarded");
                return Ok(JobOutcome::Discarded {
                    job_id: job.id,
                    aspect: job.aspect,
                });
            }

            metrics::counter!("verification_jobs_failed_total", "aspect" => job.aspect.to_string())
                .increment(1);
            tracing::error!(
                job_id = %job.id,
                candidate_id = %job.candidate_id,
                aspect = %job.aspect,
                attempts,
                error = %e,
                "Verification job failed"
            );

            Ok(JobOutcome::Failed {
                job_id: job.id,
                aspect: job.aspect,
                rationale,
            })
        }
    }
}

/// Claim and process the oldest queued job. `None` when the queue is empty.
///
/// A persistence error after the claim leaves the job in `processing`
/// until stale-claim recovery returns it to the queue.
pub async fn process_next_job(state: &AppState) -> Result<Option<JobOutcome>, WorkerError> {
    let Some(job) = queries::claim_next_queued_job(&state.db).await? else {
        return Ok(None);
    };

    tracing::info!(
        job_id = %job.id,
        candidate_id = %job.candidate_id,
        aspect = %job.aspect,
        "Processing verification job"
    );

    let stats = state.dispatcher.stats();
    let _in_flight = stats.begin_job();
    let outcome = process_job(state, &job).await?;
    stats.record(&outcome);

    Ok(Some(outcome))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &JobOutcome) {
        self.processed += 1;
        match outcome {
            JobOutcome::Succeeded { .. } => self.succeeded += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
            JobOutcome::Discarded { .. } => {}
        }
    }

    fn merge(&mut self, other: BatchSummary) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.errors += other.errors;
    }
}

async fn drain_queue(state: AppState, worker: usize) -> BatchSummary {
    let mut summary = BatchSummary::default();
    loop {
        match process_next_job(&state).await {
            Ok(Some(outcome)) => summary.record(&outcome),
            Ok(None) => break,
            Err(e) => {
                tracing::error!(worker, error = %e, "Verification worker stopped");
                summary.errors += 1;
                break;
            }
        }
    }
    summary
}

/// Drain the queue with `concurrency` parallel claim loops.
pub async fn run_batch(state: &AppState, concurrency: usize) -> BatchSummary {
    let mut loops = JoinSet::new();
    for worker in 0..concurrency.max(1) {
        loops.spawn(drain_queue(state.clone(), worker));
    }

    let mut summary = BatchSummary::default();
    while let Some(joined) = loops.join_next().await {
        match joined {
            Ok(part) => summary.merge(part),
            Err(e) => {
                tracing::error!(error = %e, "Verification worker task panicked");
                summary.errors += 1;
            }
        }
    }
    summary
}
