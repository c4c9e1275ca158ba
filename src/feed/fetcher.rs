use crate::feed::parser::{parse_feed, Article};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Feed bodies above this size are rejected rather than buffered.
const MAX_FEED_SIZE: usize = 2 * 1024 * 1024; // 2MB

/// Errors that can occur while fetching and parsing one feed.
///
/// These never escape a polling pass: the scheduler logs them and moves on
/// to the next feed, so one broken source can't starve the others. There is
/// no retry here either — the next scheduled pass is the retry.
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
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 2MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Fetch one feed and return its newest entries.
///
/// # Arguments
///
/// * `client` - Shared HTTP client
/// * `url` - The feed URL (validated at config load)
/// * `limit` - Maximum entries returned, in feed order
/// * `timeout` - Per-request deadline
///
/// # Errors
///
/// Any of [`FetchError`]; the caller treats all of them as "this feed
/// contributes zero entries this pass".
pub async fn fetch_articles(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<Article>, FetchError> {
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    let result = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    if result.skipped > 0 {
        tracing::warn!(
            feed = %url,
            skipped = result.skipped,
            "Entries without links skipped"
        );
    }

    let mut articles = result.articles;
    articles.truncate(limit);
    Ok(articles)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
