//! Article summarization through the OpenAI chat-completions API.
//!
//! The remote call is strictly best-effort: any failure (network, timeout,
//! non-2xx, malformed JSON, empty content) degrades to a deterministic
//! excerpt of the input text, and the pipeline publishes that instead. The
//! call is never retried for a single article — the cost/latency budget of
//! a polling pass stays bounded, and an article that was not published at
//! all is picked up again next pass anyway.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Characters of input kept by the excerpt fallback.
pub const FALLBACK_CHARS: usize = 200;

/// Deadline for one summarization call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("Request timed out after {}s", REQUEST_TIMEOUT.as_secs())]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Response contained no summary text")]
    EmptyContent,
}

/// Client for the summarization service.
pub struct Summarizer {
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl Summarizer {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL. Used by tests to point at a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Produce a short emoji-decorated synopsis of `text`.
    ///
    /// Never fails: on any error the first [`FALLBACK_CHARS`] characters of
    /// the input plus `"..."` are returned instead, and the error is logged
    /// at warn level. Callers must not pass an empty string — substitute
    /// the article title when there is no excerpt.
    pub async fn summarize(&self, client: &reqwest::Client, text: &str) -> String {
        match self.request_summary(client, text).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "Summarization failed, falling back to excerpt");
                fallback_excerpt(text)
            }
        }
    }

    async fn request_summary(
        &self,
        client: &reqwest::Client,
        text: &str,
    ) -> Result<String, SummarizeError> {
        let prompt = format!(
            "Summarize this AI news article in 2 short lines using emojis \
             and highlighting the key point:\n\n{text}"
        );
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = tokio::time::timeout(
            REQUEST_TIMEOUT,
            client
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| SummarizeError::Timeout)?
        .map_err(SummarizeError::Network)?;

        if !response.status().is_success() {
            return Err(SummarizeError::HttpStatus(response.status().as_u16()));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SummarizeError::MalformedResponse(e.to_string()))?;

        let content = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SummarizeError::EmptyContent)?;

        Ok(content.to_string())
    }
}

/// Deterministic fallback: first [`FALLBACK_CHARS`] characters + `"..."`.
///
/// The cut respects char boundaries, so multibyte input never panics.
fn fallback_excerpt(text: &str) -> String {
    let prefix_end = text
        .char_indices()
        .nth(FALLBACK_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    format!("{}...", &text[..prefix_end])
}
