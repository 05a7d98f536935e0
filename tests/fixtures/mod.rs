//! Seed data for database-backed tests

use evidence_verify::models::candidate::DocumentKind;
use sqlx::PgPool;
use uuid::Uuid;

/// A candidate profile to insert before a test.
#[derive(Debug, Clone)]
pub struct CandidateFixture {
    pub full_name: &'static str,
    pub skills: &'static [&'static str],
    pub projects: Option<&'static str>,
    pub experience_summary: Option<&'static str>,
    pub portfolio_links: &'static [&'static str],
    pub description: &'static str,
}

/// Fully evidenced profile with a project link shared with [`SHARED_LINK_CANDIDATE`].
pub const COMPLETE_CANDIDATE: CandidateFixture = CandidateFixture {
    full_name: "Grace Hopper",
    skills: &["rust", "postgres", "distributed systems"],
    projects: Some("Compiler toolchain: https://github.com/ghopper/flowmatic"),
    experience_summary: Some("Led the platform team at Eckert-Mauchly for six years."),
    portfolio_links: &["https://grace.dev/portfolio"],
    description: "profile with projects and portfolio links",
};

/// Submits a link another candidate already claims.
pub const SHARED_LINK_CANDIDATE: CandidateFixture = CandidateFixture {
    full_name: "Imposter Example",
    skills: &["rust"],
    projects: Some("My compiler: https://github.com/ghopper/flowmatic"),
    experience_summary: None,
    portfolio_links: &[],
    description: "project text reusing another candidate's link",
};

/// No links, no project text; readiness depends on uploaded documents alone.
pub const BARE_CANDIDATE: CandidateFixture = CandidateFixture {
    full_name: "Bare Profile",
    skills: &[],
    projects: None,
    experience_summary: None,
    portfolio_links: &[],
    description: "profile with no textual evidence",
};

/// Insert a candidate built from `fixture` and return its id.
pub async fn seed_candidate(pool: &PgPool, fixture: &CandidateFixture) -> Uuid {
    let id = Uuid::new_v4();
    let skills: Vec<String> = fixture.skills.iter().map(|s| s.to_string()).collect();
    let links: Vec<String> = fixture.portfolio_links.iter().map(|s| s.to_string()).collect();

    sqlx::query(
        r#"
        INSERT INTO candidates
            (id, full_name, email, skills, experience_summary, projects, portfolio_links)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(fixture.full_name)
    .bind(format!("{id}@example.com"))
    .bind(&skills)
    .bind(fixture.experience_summary)
    .bind(fixture.projects)
    .bind(&links)
    .execute(pool)
    .await
    .expect("Failed to seed candidate");

    id
}

/// Insert a minimal candidate whose only evidence is `projects` text.
pub async fn seed_candidate_with_projects(pool: &PgPool, full_name: &str, projects: &str) -> Uuid {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO candidates (id, full_name, email, skills, projects, portfolio_links)
        VALUES ($1, $2, $3, '{}', $4, '{}')
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(format!("{id}@example.com"))
    .bind(projects)
    .execute(pool)
    .await
    .expect("Failed to seed candidate");

    id
}

/// Attach an evidence document to a candidate and return its id.
pub async fn seed_document(
    pool: &PgPool,
    candidate_id: Uuid,
    kind: DocumentKind,
    checksum: &str,
) -> Uuid {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO candidate_documents
            (id, candidate_id, kind, file_name, url, checksum, content_type, byte_size)
        VALUES ($1, $2, $3, $4, $5, $6, 'text/plain', 64)
        "#,
    )
    .bind(id)
    .bind(candidate_id)
    .bind(kind.as_ref())
    .bind(format!("{kind}.txt"))
    .bind(format!("https://files.example.test/{id}/{checksum}"))
    .bind(checksum)
    .execute(pool)
    .await
    .expect("Failed to seed document");

    id
}

/// Change a document's contents the way an upload replacement would.
pub async fn replace_document_checksum(pool: &PgPool, document_id: Uuid, checksum: &str) {
    sqlx::query("UPDATE candidate_documents SET checksum = $2 WHERE id = $1")
        .bind(document_id)
        .bind(checksum)
        .execute(pool)
        .await
        .expect("Failed to update document checksum");
}

pub async fn delete_candidate(pool: &PgPool, candidate_id: Uuid) {
    sqlx::query("DELETE FROM candidates WHERE id = $1")
        .bind(candidate_id)
        .execute(pool)
        .await
        .expect("Failed to delete candidate");
}

/// Remove a candidate and everything the engine recorded about them.
pub async fn cleanup(pool: &PgPool, candidate_id: Uuid) {
    for statement in [
        "DELETE FROM verification_jobs WHERE candidate_id = $1",
        "DELETE FROM candidate_trust_scores WHERE candidate_id = $1",
        "DELETE FROM document_text_cache WHERE document_id IN (SELECT id FROM candidate_documents WHERE candidate_id = $1)",
    ] {
        sqlx::query(statement)
            .bind(candidate_id)
            .execute(pool)
            .await
            .expect("Failed to clean up engine state");
    }
    delete_candidate(pool, candidate_id).await;
}
