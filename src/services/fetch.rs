use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;

/// Raw document body as downloaded.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub byte_size: u64,
}

/// Retrieves uploaded evidence files.
///
/// Implementations never error: an unreachable or oversized document is
/// reported as `None`.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Option<FetchedDocument>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document server returned status {0}")]
    Status(u16),

    #[error("document exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Streams documents over HTTP, enforcing the byte ceiling as data arrives.
pub struct HttpDocumentFetcher {
    http: Client,
}

impl HttpDocumentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("evidence-verify/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    async fn download(&self, url: &str, max_bytes: u64) -> Result<FetchedDocument, FetchError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(FetchError::TooLarge { limit: max_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }

        let byte_size = bytes.len() as u64;
        Ok(FetchedDocument {
            bytes,
            content_type,
            byte_size,
        })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Option<FetchedDocument> {
        match self.download(url, max_bytes).await {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Document fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single request on a local port with `response` and return its URL.
    async fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}/document.txt")
    }

    fn chunked_response(chunks: &[&[u8]]) -> Vec<u8> {
        let mut out = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
        for chunk in chunks {
            out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    fn fetcher() -> HttpDocumentFetcher {
        HttpDocumentFetcher {
            http: Client::builder()
                .timeout(Duration::from_secs(5))
                .no_proxy()
                .build()
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn chunked_body_over_ceiling_is_rejected() {
        let chunk = [b'x'; 40];
        let url = serve_once(chunked_response(&[&chunk, &chunk, &chunk])).await;

        assert!(fetcher().fetch(&url, 100).await.is_none());
    }

    #[tokio::test]
    async fn declared_length_over_ceiling_is_rejected() {
        let body = "y".repeat(500);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let url = serve_once(response.into_bytes()).await;

        assert!(fetcher().fetch(&url, 100).await.is_none());
    }

    #[tokio::test]
    async fn body_within_ceiling_is_returned() {
        let url = serve_once(chunked_response(&[b"Official ", b"transcript"])).await;

        let document = fetcher().fetch(&url, 100).await.expect("Document should download");
        assert_eq!(document.bytes, b"Official transcript");
        assert_eq!(document.byte_size, 19);
        assert_eq!(document.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn error_status_yields_none() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        )
        .await;

        assert!(fetcher().fetch(&url, 100).await.is_none());
    }
}
