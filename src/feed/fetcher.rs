use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::content::ContentError;

/// Largest feed body accepted before the download is aborted.
pub(crate) const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while ingesting a feed.
///
/// Ingestion collapses every variant into an empty (or placeholder) item
/// list; the variants exist so the log line says what actually went wrong.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as a feed or converter response
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// The conversion service answered but reported a failure
    #[error("Converter error: {0}")]
    Upstream(String),
    /// The web parser failed to extract the page
    #[error("Extraction failed: {0}")]
    Content(#[from] ContentError),
}

/// GET a URL and return its body, enforcing a status check, a timeout over
/// the whole exchange, and the feed size limit.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, async {
        let response = client.get(url).send().await.map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE, || FetchError::ResponseTooLarge).await
    })
    .await
    .map_err(|_| FetchError::Timeout)?
}

/// Read a response body, failing with `too_large()` once it exceeds `limit`.
pub(crate) async fn read_limited_bytes<E>(
    response: reqwest::Response,
    limit: usize,
    too_large: impl Fn() -> E,
) -> Result<Vec<u8>, E>
where
    E: From<reqwest::Error>,
{
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(too_large());
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
