//! Link extraction and cross-candidate duplicate-link detection.

use regex::Regex;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;
use uuid::Uuid;

use crate::db::candidate_queries;
use crate::models::assessment::LinkOverlap;

/// Links considered per overlap search.
pub const MAX_LINKS_CHECKED: usize = 10;

/// Matches reported for a single link.
pub const MAX_MATCHES_PER_LINK: usize = 3;

/// Matches reported across all links.
pub const MAX_TOTAL_MATCHES: usize = 10;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"', ')', ']', '}', '>'];

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\bhttps?://[^\s<>"'`\[\]{}|\\^]+"#).expect("URL pattern is valid")
    })
}

/// Normalize one URL-shaped string.
///
/// Fragments are dropped and scheme, host and path are lower-cased; the
/// query string keeps its case.
pub fn normalize_link(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches(TRAILING_PUNCTUATION);
    let mut url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    url.set_fragment(None);
    let path = url.path().to_lowercase();
    url.set_path(&path);

    Some(url.to_string())
}

/// Normalize a link typed into a profile field.
///
/// Entries without a scheme are read as `https://`; those must name a dotted
/// host so that placeholders like `n/a` are not mistaken for links.
pub fn normalize_submitted_link(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.contains("://") {
        return normalize_link(trimmed);
    }

    let link = normalize_link(&format!("https://{trimmed}"))?;
    let dotted = Url::parse(&link)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.contains('.')))
        .unwrap_or(false);
    dotted.then_some(link)
}

/// Find URL-shaped substrings in `text`, normalized and deduplicated in first-seen order.
pub fn extract_links(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    url_pattern()
        .find_iter(text)
        .filter_map(|m| normalize_link(m.as_str()))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Merge link lists, keeping first-seen order.
pub fn merge_links<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for list in lists {
        for link in list {
            if seen.insert(link.as_str()) {
                merged.push(link.clone());
            }
        }
    }
    merged
}

/// The part of a link searched for in other candidates' text: no scheme, no trailing slash.
pub fn search_needle(link: &str) -> &str {
    let without_scheme = link
        .strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"))
        .unwrap_or(link);
    without_scheme.trim_end_matches('/')
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Search other candidates' evidence for the given links.
///
/// At most [`MAX_LINKS_CHECKED`] links are searched, each reporting up to
/// [`MAX_MATCHES_PER_LINK`] other candidates, capped at [`MAX_TOTAL_MATCHES`].
pub async fn find_overlaps(
    pool: &PgPool,
    candidate_id: Uuid,
    links: &[String],
) -> Result<Vec<LinkOverlap>, sqlx::Error> {
    let mut overlaps = Vec::new();

    for link in links.iter().take(MAX_LINKS_CHECKED) {
        let needle = search_needle(link);
        if needle.is_empty() {
            continue;
        }
        let remaining = MAX_TOTAL_MATCHES - overlaps.len();
        let limit = MAX_MATCHES_PER_LINK.min(remaining) as i64;

        let mentions = candidate_queries::find_link_mentions(
            pool,
            candidate_id,
            &format!("%{}%", escape_like(needle)),
            limit,
        )
        .await?;

        overlaps.extend(mentions.into_iter().map(|(other_id, other_name)| LinkOverlap {
            link: link.clone(),
            other_candidate_id: other_id,
            other_candidate_name: other_name,
        }));

        if overlaps.len() >= MAX_TOTAL_MATCHES {
            break;
        }
    }

    if !overlaps.is_empty() {
        tracing::info!(
            candidate_id = %candidate_id,
            overlaps = overlaps.len(),
            "Submitted links also appear in other candidates' evidence"
        );
    }

    Ok(overlaps)
}

/// Human-readable summary stored as the job's link notes.
pub fn overlap_notes(overlaps: &[LinkOverlap]) -> Option<String> {
    if overlaps.is_empty() {
        return None;
    }
    Some(
        overlaps
            .iter()
            .map(|o| {
                format!(
                    "{} also appears in evidence of {} ({})",
                    o.link, o.other_candidate_name, o.other_candidate_id
                )
            })
            .collect::<Vec<_>>()
            .join("; "),
    )
}
