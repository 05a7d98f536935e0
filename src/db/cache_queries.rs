use sqlx::PgPool;
use uuid::Uuid;

use crate::models::document::DocumentTextCacheEntry;

/// Cached text for a document at a specific checksum.
pub async fn get_cached_text(
    pool: &PgPool,
    document_id: Uuid,
    checksum: &str,
) -> Result<Option<DocumentTextCacheEntry>, sqlx::Error> {
    sqlx::query_as::<_, DocumentTextCacheEntry>(
        r#"
        SELECT document_id, checksum, text_content, content_type, byte_size, updated_at
        FROM document_text_cache
        WHERE document_id = $1 AND checksum = $2
        "#,
    )
    .bind(document_id)
    .bind(checksum)
    .fetch_optional(pool)
    .await
}

/// Store extracted text, replacing entries for older checksums of the same document.
pub async fn store_cached_text(
    pool: &PgPool,
    document_id: Uuid,
    checksum: &str,
    text_content: &str,
    content_type: Option<&str>,
    byte_size: i64,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM document_text_cache WHERE document_id = $1 AND checksum <> $2")
        .bind(document_id)
        .bind(checksum)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO document_text_cache (document_id, checksum, text_content, content_type, byte_size)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (document_id, checksum) DO UPDATE
        SET text_content = EXCLUDED.text_content,
            content_type = EXCLUDED.content_type,
            byte_size = EXCLUDED.byte_size,
            updated_at = NOW()
        "#,
    )
    .bind(document_id)
    .bind(checksum)
    .bind(text_content)
    .bind(content_type)
    .bind(byte_size)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}
