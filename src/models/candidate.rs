use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::services::links;

/// Candidate record as read from the profile store.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub experience_summary: Option<String>,
    pub years_experience: Option<i32>,
    pub education: Option<String>,
    pub projects: Option<String>,
    pub portfolio_links: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Category an uploaded evidence file was filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    Transcript,
    Portfolio,
    Other,
}

/// Uploaded evidence file metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub kind: DocumentKind,
    pub file_name: String,
    pub url: String,
    pub checksum: String,
    pub content_type: Option<String>,
    pub byte_size: Option<i64>,
}

/// Everything the engine knows about a candidate at one point in time.
#[derive(Debug, Clone)]
pub struct CandidateEvidence {
    pub candidate: Candidate,
    pub documents: Vec<EvidenceDocument>,
    /// Normalized links found in the structured profile fields.
    pub links: Vec<String>,
}

impl CandidateEvidence {
    pub fn new(candidate: Candidate, documents: Vec<EvidenceDocument>) -> Self {
        let submitted: Vec<String> = candidate
            .portfolio_links
            .iter()
            .filter_map(|link| links::normalize_submitted_link(link))
            .collect();
        let text = [&candidate.projects, &candidate.experience_summary]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let mentioned = links::extract_links(&text);
        let links = links::merge_links([submitted.as_slice(), mentioned.as_slice()]);

        Self {
            candidate,
            documents,
            links,
        }
    }

    pub fn documents_of<'a>(
        &'a self,
        kinds: &'a [DocumentKind],
    ) -> impl Iterator<Item = &'a EvidenceDocument> + 'a {
        self.documents.iter().filter(move |d| kinds.contains(&d.kind))
    }

    pub fn has_document(&self, kinds: &[DocumentKind]) -> bool {
        self.documents_of(kinds).next().is_some()
    }
}
