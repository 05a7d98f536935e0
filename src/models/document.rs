use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Extracted text memoized per document content checksum.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentTextCacheEntry {
    pub document_id: Uuid,
    pub checksum: String,
    pub text_content: String,
    pub content_type: Option<String>,
    pub byte_size: i64,
    pub updated_at: DateTime<Utc>,
}
