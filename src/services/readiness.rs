//! Decides which aspects of a candidate have enough evidence to verify.
//!
//! Called whenever a candidate's evidence changes and after every successful
//! job, so the `full_profile` aspect is queued as soon as its prerequisites
//! are met.

use serde::Serialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{candidate_queries, queries};
use crate::models::candidate::{CandidateEvidence, DocumentKind};
use crate::models::job::Aspect;
use crate::services::queue::{self, EnqueueOutcome, QueueError};
use crate::services::snapshot;

/// Presence of each kind of evidence on a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvidenceSignals {
    pub has_resume_document: bool,
    pub has_transcript_document: bool,
    pub has_portfolio_document: bool,
    pub has_links: bool,
    pub has_projects_text: bool,
}

impl EvidenceSignals {
    pub fn from_evidence(evidence: &CandidateEvidence) -> Self {
        Self {
            has_resume_document: evidence.has_document(&[DocumentKind::Resume]),
            has_transcript_document: evidence
                .has_document(&[DocumentKind::Transcript, DocumentKind::Other]),
            has_portfolio_document: evidence.has_document(&[DocumentKind::Portfolio]),
            has_links: !evidence.links.is_empty(),
            has_projects_text: evidence
                .candidate
                .projects
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty()),
        }
    }
}

pub fn resume_ready(signals: &EvidenceSignals, previously_succeeded: bool) -> bool {
    signals.has_resume_document || previously_succeeded
}

pub fn transcript_ready(signals: &EvidenceSignals, previously_succeeded: bool) -> bool {
    signals.has_transcript_document || previously_succeeded
}

pub fn project_links_ready(signals: &EvidenceSignals, previously_succeeded: bool) -> bool {
    signals.has_links
        || signals.has_portfolio_document
        || signals.has_projects_text
        || previously_succeeded
}

/// Readiness of one evidence aspect. `full_profile` is gated separately.
pub fn evidence_ready(aspect: Aspect, signals: &EvidenceSignals, previously_succeeded: bool) -> bool {
    match aspect {
        Aspect::Resume => resume_ready(signals, previously_succeeded),
        Aspect::Transcript => transcript_ready(signals, previously_succeeded),
        Aspect::ProjectLinks => project_links_ready(signals, previously_succeeded),
        Aspect::FullProfile => false,
    }
}

/// `full_profile` may run once every evidence aspect has succeeded at least once.
pub fn full_profile_eligible(succeeded: &[Aspect]) -> bool {
    Aspect::EVIDENCE.iter().all(|a| succeeded.contains(a))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    NotReady,
    AlreadyActive { job_id: Uuid },
    UpToDate { job_id: Uuid },
    Queued { job_id: Uuid },
}

impl From<&EnqueueOutcome> for Decision {
    fn from(outcome: &EnqueueOutcome) -> Self {
        let job_id = outcome.job().id;
        match outcome {
            EnqueueOutcome::Queued(_) => Decision::Queued { job_id },
            EnqueueOutcome::AlreadyActive(_) => Decision::AlreadyActive { job_id },
            EnqueueOutcome::UpToDate(_) => Decision::UpToDate { job_id },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AspectDecision {
    pub aspect: Aspect,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub candidate_id: Uuid,
    pub candidate_found: bool,
    pub decisions: Vec<AspectDecision>,
}

impl ReadinessReport {
    fn missing(candidate_id: Uuid) -> Self {
        Self {
            candidate_id,
            candidate_found: false,
            decisions: Vec::new(),
        }
    }

    pub fn decision(&self, aspect: Aspect) -> Option<&Decision> {
        self.decisions
            .iter()
            .find(|d| d.aspect == aspect)
            .map(|d| &d.decision)
    }

    pub fn queued(&self) -> Vec<Aspect> {
        self.decisions
            .iter()
            .filter(|d| matches!(d.decision, Decision::Queued { .. }))
            .map(|d| d.aspect)
            .collect()
    }
}

/// Enqueue every aspect whose evidence is present, then the full profile if eligible.
pub async fn ensure_readiness(
    state: &AppState,
    candidate_id: Uuid,
) -> Result<ReadinessReport, QueueError> {
    let Some(evidence) = candidate_queries::load_evidence(&state.db, candidate_id).await? else {
        tracing::debug!(candidate_id = %candidate_id, "Readiness skipped for unknown candidate");
        return Ok(ReadinessReport::missing(candidate_id));
    };

    let signals = EvidenceSignals::from_evidence(&evidence);
    let succeeded = queries::succeeded_aspects(&state.db, candidate_id).await?;
    let mut decisions = Vec::with_capacity(Aspect::EVIDENCE.len() + 1);

    for aspect in Aspect::EVIDENCE {
        let decision = if evidence_ready(aspect, &signals, succeeded.contains(&aspect)) {
            let fingerprint = snapshot::fingerprint_for(aspect, &evidence);
            let outcome = queue::enqueue(&state.db, candidate_id, aspect, &fingerprint).await?;
            Decision::from(&outcome)
        } else {
            Decision::NotReady
        };
        decisions.push(AspectDecision { aspect, decision });
    }

    let full_profile = if full_profile_eligible(&succeeded) {
        let fingerprint = snapshot::fingerprint_for(Aspect::FullProfile, &evidence);
        let outcome =
            queue::enqueue(&state.db, candidate_id, Aspect::FullProfile, &fingerprint).await?;
        Decision::from(&outcome)
    } else {
        Decision::NotReady
    };
    decisions.push(AspectDecision {
        aspect: Aspect::FullProfile,
        decision: full_profile,
    });

    let report = ReadinessReport {
        candidate_id,
        candidate_found: true,
        decisions,
    };

    let queued = report.queued();
    if !queued.is_empty() {
        tracing::info!(candidate_id = %candidate_id, queued = ?queued, "Verification work queued");
        state.dispatcher.notify();
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::test_support::{candidate, document};

    fn bare_evidence() -> CandidateEvidence {
        let mut c = candidate();
        c.portfolio_links.clear();
        c.projects = None;
        c.experience_summary = None;
        CandidateEvidence::new(c, Vec::new())
    }

    #[test]
    fn bare_candidate_is_not_ready_anywhere() {
        let signals = EvidenceSignals::from_evidence(&bare_evidence());
        assert_eq!(signals, EvidenceSignals::default());
        for aspect in Aspect::EVIDENCE {
            assert!(!evidence_ready(aspect, &signals, false), "{aspect} should wait");
        }
    }

    #[test]
    fn schemeless_portfolio_link_makes_project_links_ready() {
        let mut c = bare_evidence().candidate;
        c.portfolio_links = vec!["github.com/ada/engine".to_string()];
        let signals = EvidenceSignals::from_evidence(&CandidateEvidence::new(c, Vec::new()));

        assert!(signals.has_links);
        assert!(project_links_ready(&signals, false));
        assert!(!resume_ready(&signals, false));
    }

    #[test]
    fn documents_drive_readiness() {
        let mut evidence = bare_evidence();
        evidence.documents = vec![
            document(DocumentKind::Resume, "a"),
            document(DocumentKind::Other, "b"),
        ];
        let signals = EvidenceSignals::from_evidence(&evidence);

        assert!(resume_ready(&signals, false));
        assert!(transcript_ready(&signals, false));
        assert!(!project_links_ready(&signals, false));
    }

    #[test]
    fn projects_text_or_links_make_project_links_ready() {
        let evidence = CandidateEvidence::new(candidate(), Vec::new());
        let signals = EvidenceSignals::from_evidence(&evidence);
        assert!(signals.has_links);
        assert!(signals.has_projects_text);
        assert!(project_links_ready(&signals, false));

        let mut blank = bare_evidence();
        blank.candidate.projects = Some("   ".to_string());
        let signals = EvidenceSignals::from_evidence(&blank);
        assert!(!project_links_ready(&signals, false));
    }

    #[test]
    fn prior_success_keeps_an_aspect_ready() {
        let signals = EvidenceSignals::default();
        assert!(resume_ready(&signals, true));
        assert!(transcript_ready(&signals, true));
        assert!(project_links_ready(&signals, true));
    }

    #[test]
    fn full_profile_waits_for_all_three() {
        assert!(!full_profile_eligible(&[]));
        assert!(!full_profile_eligible(&[Aspect::Resume, Aspect::ProjectLinks]));
        assert!(!full_profile_eligible(&[
            Aspect::Resume,
            Aspect::Transcript,
            Aspect::FullProfile
        ]));
        assert!(full_profile_eligible(&[
            Aspect::ProjectLinks,
            Aspect::Transcript,
            Aspect::Resume
        ]));
    }

    #[test]
    fn full_profile_is_never_evidence_ready() {
        let signals = EvidenceSignals {
            has_resume_document: true,
            has_transcript_document: true,
            has_portfolio_document: true,
            has_links: true,
            has_projects_text: true,
        };
        assert!(!evidence_ready(Aspect::FullProfile, &signals, true));
    }

    #[test]
    fn decisions_serialize_with_aspect_and_job() {
        let job_id = Uuid::nil();
        let value = serde_json::to_value(AspectDecision {
            aspect: Aspect::ProjectLinks,
            decision: Decision::Queued { job_id },
        })
        .unwrap();
        assert_eq!(value["aspect"], "project_links");
        assert_eq!(value["decision"], "queued");
        assert_eq!(value["job_id"], job_id.to_string());
    }
}
