//! Aspect-scoped evidence snapshots and their fingerprints.
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering of the
//! snapshot: object keys sorted recursively, arrays of objects sorted by
//! their canonical form. Two snapshots that differ only in key or document
//! order therefore fingerprint identically.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::models::candidate::{CandidateEvidence, DocumentKind, EvidenceDocument};
use crate::models::job::Aspect;

/// Document kinds that count as evidence for an aspect.
pub fn document_kinds(aspect: Aspect) -> &'static [DocumentKind] {
    match aspect {
        Aspect::Resume => &[DocumentKind::Resume],
        Aspect::Transcript => &[DocumentKind::Transcript, DocumentKind::Other],
        Aspect::ProjectLinks => &[DocumentKind::Portfolio],
        Aspect::FullProfile => &[
            DocumentKind::Resume,
            DocumentKind::Transcript,
            DocumentKind::Portfolio,
            DocumentKind::Other,
        ],
    }
}

/// Structured candidate fields relevant to an aspect.
pub fn candidate_fields(aspect: Aspect, evidence: &CandidateEvidence) -> Value {
    let c = &evidence.candidate;
    let mut fields = Map::new();

    if matches!(aspect, Aspect::Resume | Aspect::FullProfile) {
        fields.insert("full_name".into(), json!(c.full_name));
        fields.insert("email".into(), json!(c.email));
        fields.insert("headline".into(), json!(c.headline));
        fields.insert("location".into(), json!(c.location));
        fields.insert("experience_summary".into(), json!(c.experience_summary));
        fields.insert("years_experience".into(), json!(c.years_experience));
    }
    if matches!(aspect, Aspect::Transcript | Aspect::FullProfile) {
        fields.insert("education".into(), json!(c.education));
    }
    if matches!(aspect, Aspect::ProjectLinks | Aspect::FullProfile) {
        fields.insert("projects".into(), json!(c.projects));
        let submitted: Vec<&str> = c
            .portfolio_links
            .iter()
            .map(|link| link.trim())
            .filter(|link| !link.is_empty())
            .collect();
        fields.insert("portfolio_links".into(), json!(submitted));
        fields.insert("links".into(), json!(evidence.links));
    }
    if aspect != Aspect::Transcript {
        fields.insert("skills".into(), json!(c.skills));
    }

    Value::Object(fields)
}

fn document_entry(doc: &EvidenceDocument) -> Value {
    json!({
        "id": doc.id,
        "kind": doc.kind,
        "file_name": doc.file_name,
        "checksum": doc.checksum,
    })
}

/// Build the snapshot hashed for `aspect`.
pub fn build_snapshot(aspect: Aspect, evidence: &CandidateEvidence) -> Value {
    let documents: Vec<Value> = evidence
        .documents_of(document_kinds(aspect))
        .map(document_entry)
        .collect();

    json!({
        "aspect": aspect,
        "candidate_id": evidence.candidate.id,
        "fields": candidate_fields(aspect, evidence),
        "documents": documents,
    })
}

/// Serialize `value` with sorted object keys and order-independent arrays of objects.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            let mut rendered: Vec<String> = items.iter().map(canonical_json).collect();
            if items.iter().any(Value::is_object) {
                rendered.sort();
            }
            out.push('[');
            out.push_str(&rendered.join(","));
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Lowercase hex SHA-256 of the canonical rendering.
pub fn fingerprint(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn fingerprint_for(aspect: Aspect, evidence: &CandidateEvidence) -> String {
    fingerprint(&build_snapshot(aspect, evidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::test_support::{candidate, document};

    #[test]
    fn key_order_does_not_change_fingerprint() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":[1,2],"x":"s"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":"s","y":[1,2]},"b":1}"#).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn array_of_objects_order_does_not_change_fingerprint() {
        let a = json!({"docs": [{"id": 1, "k": "r"}, {"k": "t", "id": 2}]});
        let b = json!({"docs": [{"id": 2, "k": "t"}, {"id": 1, "k": "r"}]});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn scalar_array_order_is_significant() {
        let a = json!({"skills": ["rust", "go"]});
        let b = json!({"skills": ["go", "rust"]});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let value = json!({"z": null, "a": [true, "x"]});
        assert_eq!(canonical_json(&value), r#"{"a":[true,"x"],"z":null}"#);
    }

    #[test]
    fn document_order_does_not_change_aspect_fingerprint() {
        let resume_a = document(DocumentKind::Resume, "aaa");
        let resume_b = document(DocumentKind::Resume, "bbb");

        let first = CandidateEvidence::new(candidate(), vec![resume_a.clone(), resume_b.clone()]);
        let second = CandidateEvidence::new(candidate(), vec![resume_b, resume_a]);

        assert_eq!(
            fingerprint_for(Aspect::Resume, &first),
            fingerprint_for(Aspect::Resume, &second)
        );
    }

    #[test]
    fn unrelated_fields_do_not_affect_aspect_fingerprint() {
        let base = CandidateEvidence::new(candidate(), Vec::new());
        let mut changed = candidate();
        changed.skills.push("kubernetes".to_string());
        let changed = CandidateEvidence::new(changed, Vec::new());

        assert_eq!(
            fingerprint_for(Aspect::Transcript, &base),
            fingerprint_for(Aspect::Transcript, &changed)
        );
        assert_ne!(
            fingerprint_for(Aspect::Resume, &base),
            fingerprint_for(Aspect::Resume, &changed)
        );
    }

    #[test]
    fn reupload_with_new_checksum_changes_fingerprint() {
        let doc = document(DocumentKind::Transcript, "v1");
        let mut reuploaded = doc.clone();
        reuploaded.checksum = "v2".to_string();

        let before = CandidateEvidence::new(candidate(), vec![doc]);
        let after = CandidateEvidence::new(candidate(), vec![reuploaded]);

        assert_ne!(
            fingerprint_for(Aspect::Transcript, &before),
            fingerprint_for(Aspect::Transcript, &after)
        );
    }

    #[test]
    fn editing_a_schemeless_portfolio_link_changes_fingerprint() {
        let mut first = candidate();
        first.portfolio_links = vec!["github.com/ada/engine".to_string()];
        let mut second = candidate();
        second.portfolio_links = vec!["github.com/someone-else/other".to_string()];

        let first = CandidateEvidence::new(first, Vec::new());
        let second = CandidateEvidence::new(second, Vec::new());

        assert!(first.links.contains(&"https://github.com/ada/engine".to_string()));
        for aspect in [Aspect::ProjectLinks, Aspect::FullProfile] {
            assert_ne!(
                fingerprint_for(aspect, &first),
                fingerprint_for(aspect, &second),
                "{aspect} should see the edited link"
            );
        }
        assert_eq!(
            fingerprint_for(Aspect::Resume, &first),
            fingerprint_for(Aspect::Resume, &second)
        );
    }

    #[test]
    fn full_profile_sees_every_document() {
        let evidence = CandidateEvidence::new(
            candidate(),
            vec![
                document(DocumentKind::Resume, "r"),
                document(DocumentKind::Portfolio, "p"),
            ],
        );
        let snapshot = build_snapshot(Aspect::FullProfile, &evidence);
        assert_eq!(snapshot["documents"].as_array().unwrap().len(), 2);

        let resume = build_snapshot(Aspect::Resume, &evidence);
        assert_eq!(resume["documents"].as_array().unwrap().len(), 1);
    }
}
