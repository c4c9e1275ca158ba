//! Publishing to the Telegram channel.
//!
//! A thin Bot API client plus the caption composer. The client speaks the
//! two methods this bot needs: `sendPhoto` (the normal path) and
//! `sendMessage` (fallback when Telegram rejects the photo URL, so a bad
//! image never costs the channel an article). HTTP 429 responses get a
//! bounded retry that honors Telegram's `retry_after` hint; every other
//! failure is returned to the scheduler, which logs it and moves on.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::util::truncate_chars;

/// Telegram's caption limit for photo posts.
pub const CAPTION_LIMIT: usize = 1024;

/// Deadline for one Bot API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Retries attempted when Telegram answers 429.
const MAX_RATE_LIMIT_RETRIES: u32 = 2;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

const ELLIPSIS: &str = "...";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Request timed out after {}s", REQUEST_TIMEOUT.as_secs())]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Telegram API rejected the request (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
}

/// Telegram Bot API client bound to one channel.
pub struct TelegramClient {
    bot_token: SecretString,
    chat_id: String,
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: SecretString, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token,
            chat_id: chat_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL. Used by tests to point at a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Post a photo with a Markdown caption to the channel.
    ///
    /// If Telegram rejects the request itself (bad photo URL, caption
    /// formatting), the caption is re-sent as a plain text message so the
    /// article still reaches the channel. Network-level failures and
    /// exhausted rate-limit retries are returned as errors.
    pub async fn send_photo(
        &self,
        client: &reqwest::Client,
        photo_url: &str,
        caption: &str,
    ) -> Result<(), PublishError> {
        let payload = json!({
            "chat_id": self.chat_id,
            "photo": photo_url,
            "caption": caption,
            "parse_mode": "Markdown",
        });

        match self.call(client, "sendPhoto", &payload).await {
            Ok(()) => Ok(()),
            Err(PublishError::Api { status, body }) => {
                tracing::warn!(
                    status = status,
                    body = %body,
                    "sendPhoto rejected, falling back to text message"
                );
                self.send_message(client, caption).await
            }
            Err(e) => Err(e),
        }
    }

    /// Post a plain Markdown text message to the channel.
    pub async fn send_message(
        &self,
        client: &reqwest::Client,
        text: &str,
    ) -> Result<(), PublishError> {
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        self.call(client, "sendMessage", &payload).await
    }

    async fn call(
        &self,
        client: &reqwest::Client,
        method: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/bot{}/{}",
            self.base_url,
            self.bot_token.expose_secret(),
            method
        );

        let mut attempt = 0u32;
        loop {
            let response = tokio::time::timeout(REQUEST_TIMEOUT, client.post(&url).json(payload).send())
                .await
                .map_err(|_| PublishError::Timeout)?
                .map_err(PublishError::Network)?;

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_RATE_LIMIT_RETRIES {
                    return Err(PublishError::RateLimited(MAX_RATE_LIMIT_RETRIES));
                }
                let body = response.text().await.unwrap_or_default();
                let delay_secs = retry_after(&body).unwrap_or(1u64 << attempt);
                tracing::warn!(
                    method = method,
                    delay_secs = delay_secs,
                    retry = attempt,
                    "Telegram rate limit, backing off"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PublishError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(());
        }
    }
}

/// Pull `parameters.retry_after` out of a 429 response body.
fn retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("parameters")?
        .get("retry_after")?
        .as_u64()
}

/// Compose the channel caption for an article.
///
/// Format: bold title, summary body, labeled link. The result never
/// exceeds [`CAPTION_LIMIT`] characters: the summary is truncated first,
/// and in the degenerate case where title plus link alone overflow, the
/// whole caption is cut.
pub fn compose_caption(title: &str, summary: &str, link: &str) -> String {
    let full = render_caption(title, summary, link);
    if full.chars().count() <= CAPTION_LIMIT {
        return full;
    }

    // Shrink only the summary; the title and link always survive.
    let overhead = full.chars().count() - summary.chars().count();
    let budget = CAPTION_LIMIT
        .saturating_sub(overhead)
        .saturating_sub(ELLIPSIS.chars().count());
    let trimmed = render_caption(title, &truncate_chars(summary, budget, ELLIPSIS), link);
    if trimmed.chars().count() <= CAPTION_LIMIT {
        return trimmed;
    }

    truncate_chars(
        &trimmed,
        CAPTION_LIMIT - ELLIPSIS.chars().count(),
        ELLIPSIS,
    )
}

fn render_caption(title: &str, summary: &str, link: &str) -> String {
    format!("📰 *{title}*\n\n{summary}\n\n🔗 [Read full article]({link})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn telegram(base: &str) -> TelegramClient {
        TelegramClient::new(SecretString::from("test-token"), "@channel").with_base_url(base)
    }

    // ------------------------------------------------------------------
    // Caption composition
    // ------------------------------------------------------------------

    #[test]
    fn test_caption_contains_title_summary_and_link() {
        let caption = compose_caption("Big News", "🤖 Things happened.", "https://example.com/a");
        assert_eq!(
            caption,
            "📰 *Big News*\n\n🤖 Things happened.\n\n🔗 [Read full article](https://example.com/a)"
        );
    }

    #[test]
    fn test_long_summary_truncated_to_fit() {
        let summary = "x".repeat(2000);
        let caption = compose_caption("Title", &summary, "https://example.com/a");
        assert!(caption.chars().count() <= CAPTION_LIMIT);
        assert!(caption.starts_with("📰 *Title*"));
        assert!(caption.contains("https://example.com/a"));
        assert!(caption.contains("..."));
    }

    #[test]
    fn test_oversized_title_still_bounded() {
        let title = "t".repeat(3000);
        let caption = compose_caption(&title, "summary", "https://example.com/a");
        assert!(caption.chars().count() <= CAPTION_LIMIT);
    }

    proptest! {
        #[test]
        fn prop_caption_never_exceeds_limit(
            title in ".{0,600}",
            summary in ".{0,3000}",
            link in "[a-z]{1,40}",
        ) {
            let caption = compose_caption(&title, &summary, &format!("https://example.com/{link}"));
            prop_assert!(caption.chars().count() <= CAPTION_LIMIT);
        }
    }

    // ------------------------------------------------------------------
    // Bot API calls
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_send_photo_posts_expected_payload() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendPhoto"))
            .and(body_partial_json(json!({
                "chat_id": "@channel",
                "photo": "https://cdn.example.com/pic.jpg",
                "caption": "caption text",
                "parse_mode": "Markdown",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        telegram(&mock_server.uri())
            .send_photo(&client, "https://cdn.example.com/pic.jpg", "caption text")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_photo_falls_back_to_text_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendPhoto"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: wrong file identifier"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_partial_json(json!({"text": "caption text"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        telegram(&mock_server.uri())
            .send_photo(&client, "https://bad.example.com/pic", "caption text")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_both_methods_rejected_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("no"))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = telegram(&mock_server.uri())
            .send_photo(&client, "https://x.example.com/p", "caption")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_succeeds() {
        let mock_server = MockServer::start().await;

        // First request: 429 with retry_after hint, then success
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "ok": false,
                "parameters": {"retry_after": 0}
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        telegram(&mock_server.uri())
            .send_message(&client, "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_gives_up() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "ok": false,
                "parameters": {"retry_after": 0}
            })))
            .expect(3) // initial attempt + 2 retries
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let err = telegram(&mock_server.uri())
            .send_message(&client, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::RateLimited(_)));
    }

    #[test]
    fn test_retry_after_parsed_from_body() {
        let body = r#"{"ok":false,"parameters":{"retry_after":17}}"#;
        assert_eq!(retry_after(body), Some(17));
        assert_eq!(retry_after("not json"), None);
        assert_eq!(retry_after("{}"), None);
    }
}
