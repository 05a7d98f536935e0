use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::db::cache_queries;
use crate::models::candidate::EvidenceDocument;
use crate::services::extract::{self, ExtractError};
use crate::services::fetch::DocumentFetcher;

/// Upper bound on parsing one document. The blocking thread is abandoned,
/// not interrupted, when it is exceeded.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
enum ExtractFailure {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("text extraction exceeded {0:?}")]
    TimedOut(Duration),

    #[error("text extraction task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Run a parser on the blocking pool, giving up after `limit`.
async fn extract_bounded<F>(limit: Duration, parse: F) -> Result<Option<String>, ExtractFailure>
where
    F: FnOnce() -> Result<Option<String>, ExtractError> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(parse)).await {
        Ok(joined) => Ok(joined??),
        Err(_) => Err(ExtractFailure::TimedOut(limit)),
    }
}

/// Memoizes extracted document text keyed by `(document_id, checksum)`.
///
/// Every failure degrades to "no text for this document" so verification can
/// proceed on structured fields alone. Documents that yield no text are cached
/// as empty entries and are not downloaded again until their checksum changes.
pub struct DocumentTextCache<'a> {
    pool: &'a PgPool,
    fetcher: Arc<dyn DocumentFetcher>,
    max_bytes: u64,
    preview_chars: usize,
}

impl<'a> DocumentTextCache<'a> {
    pub fn new(
        pool: &'a PgPool,
        fetcher: Arc<dyn DocumentFetcher>,
        max_bytes: u64,
        preview_chars: usize,
    ) -> Self {
        Self {
            pool,
            fetcher,
            max_bytes,
            preview_chars,
        }
    }

    pub async fn get_text(&self, document: &EvidenceDocument) -> Option<String> {
        match cache_queries::get_cached_text(self.pool, document.id, &document.checksum).await {
            Ok(Some(entry)) => {
                metrics::counter!("document_text_cache_hits_total").increment(1);
                return (!entry.text_content.is_empty()).then_some(entry.text_content);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(document_id = %document.id, error = %e, "Document cache lookup failed");
            }
        }
        metrics::counter!("document_text_cache_misses_total").increment(1);

        let fetched = self.fetcher.fetch(&document.url, self.max_bytes).await?;
        if fetched.byte_size > self.max_bytes {
            tracing::warn!(
                document_id = %document.id,
                byte_size = fetched.byte_size,
                limit = self.max_bytes,
                "Fetched document exceeds byte ceiling, skipping"
            );
            return None;
        }

        let content_type = fetched.content_type.or_else(|| document.content_type.clone());
        let byte_size = fetched.byte_size;
        let bytes = fetched.bytes;
        let declared_type = content_type.clone();
        let file_name = document.file_name.clone();
        let preview_chars = self.preview_chars;

        let extracted = extract_bounded(EXTRACT_TIMEOUT, move || {
            extract::preview_text(&bytes, declared_type.as_deref(), &file_name, preview_chars)
        })
        .await;

        let text = match extracted {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::debug!(document_id = %document.id, "Document has no readable text");
                String::new()
            }
            Err(ExtractFailure::Aborted(e)) => {
                tracing::warn!(document_id = %document.id, error = %e, "Text extraction task aborted");
                return None;
            }
            Err(e) => {
                tracing::warn!(document_id = %document.id, error = %e, "Text extraction failed");
                String::new()
            }
        };

        if let Err(e) = cache_queries::store_cached_text(
            self.pool,
            document.id,
            &document.checksum,
            &text,
            content_type.as_deref(),
            byte_size as i64,
        )
        .await
        {
            tracing::warn!(document_id = %document.id, error = %e, "Failed to cache document text");
        }

        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extraction_returns_parsed_text() {
        let text = extract_bounded(Duration::from_secs(5), || Ok(Some("Dean's list".to_string())))
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("Dean's list"));
    }

    #[tokio::test]
    async fn slow_extraction_is_abandoned() {
        let result = extract_bounded(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Some("too late".to_string()))
        })
        .await;
        assert!(matches!(result, Err(ExtractFailure::TimedOut(_))));
    }

    #[tokio::test]
    async fn parser_errors_pass_through() {
        let result = extract_bounded(Duration::from_secs(5), || Err(ExtractError::Unsupported)).await;
        assert!(matches!(result, Err(ExtractFailure::Extract(ExtractError::Unsupported))));
    }
}
