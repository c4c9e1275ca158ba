//! Image resolution for article posts.
//!
//! Given an article URL, fetch the page and look for a representative
//! image: social-preview metadata first (Open Graph, then Twitter Card),
//! then the first inline `<img>`. Extracted URLs are normalized —
//! protocol-relative `//host/x` becomes explicit https, page-relative paths
//! are resolved against the article URL. Every failure path lands on a
//! stock image from the configured fallback pool, so resolution never
//! raises into the pipeline.

use rand::seq::IndexedRandom;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Article pages above this size are abandoned in favor of a stock image.
const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Used only if the configured fallback pool is empty.
const LAST_RESORT_IMAGE: &str = "https://source.unsplash.com/600x400/?technology";

/// Meta tag conventions checked in order of preference.
const META_SELECTORS: &[&str] = &[
    r#"meta[property="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
    r#"meta[name="twitter:image:src"]"#,
];

#[derive(Debug, Error)]
enum ImageError {
    #[error("Invalid article URL")]
    InvalidUrl,
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
}

/// Resolves an illustrative image URL for an article.
pub struct ImageResolver {
    fallback_pool: Vec<String>,
    timeout: Duration,
}

impl ImageResolver {
    pub fn new(fallback_pool: Vec<String>, timeout: Duration) -> Self {
        Self {
            fallback_pool,
            timeout,
        }
    }

    /// Find an image for the article at `article_url`.
    ///
    /// Always returns a syntactically valid URL string: scraped from the
    /// page when possible, otherwise a uniformly random pick from the
    /// fallback pool. Fetch and parse problems are logged at debug level
    /// only — a missing picture is routine, not an incident.
    pub async fn resolve(&self, client: &reqwest::Client, article_url: &str) -> String {
        match self.extract(client, article_url).await {
            Ok(Some(image_url)) => image_url,
            Ok(None) => {
                tracing::debug!(article = %article_url, "No image found on page, using stock image");
                self.stock_image()
            }
            Err(e) => {
                tracing::debug!(article = %article_url, error = %e, "Page fetch failed, using stock image");
                self.stock_image()
            }
        }
    }

    async fn extract(
        &self,
        client: &reqwest::Client,
        article_url: &str,
    ) -> Result<Option<String>, ImageError> {
        let page_url = Url::parse(article_url).map_err(|_| ImageError::InvalidUrl)?;

        let response = tokio::time::timeout(self.timeout, client.get(article_url).send())
            .await
            .map_err(|_| ImageError::Timeout)?
            .map_err(ImageError::Network)?;

        if !response.status().is_success() {
            return Err(ImageError::HttpStatus(response.status().as_u16()));
        }

        let html = read_limited_text(response, MAX_PAGE_SIZE).await?;

        // Parsing happens in a plain function after the body is fully read:
        // scraper's DOM is not Send and must not be held across an await.
        Ok(extract_image_url(&html, &page_url))
    }

    fn stock_image(&self) -> String {
        let mut rng = rand::rng();
        self.fallback_pool
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| LAST_RESORT_IMAGE.to_string())
    }
}

/// Walk the parsed page for a usable image URL.
fn extract_image_url(html: &str, page_url: &Url) -> Option<String> {
    let doc = Html::parse_document(html);

    for sel_str in META_SELECTORS {
        if let Ok(sel) = Selector::parse(sel_str) {
            for node in doc.select(&sel) {
                if let Some(content) = node.value().attr("content") {
                    if let Some(normalized) = normalize_image_url(page_url, content) {
                        return Some(normalized);
                    }
                }
            }
        }
    }

    // No preview metadata: fall back to the first embedded image that
    // normalizes to an http(s) URL (skips data: URIs and junk).
    if let Ok(sel) = Selector::parse("img") {
        for node in doc.select(&sel) {
            if let Some(src) = node.value().attr("src") {
                if let Some(normalized) = normalize_image_url(page_url, src) {
                    return Some(normalized);
                }
            }
        }
    }

    None
}

/// Normalize a raw image reference into an absolute http(s) URL.
///
/// - `//host/pic.jpg` → `https://host/pic.jpg`
/// - absolute http(s) URLs pass through
/// - relative paths are joined against the page URL
/// - anything else (`data:`, empty, unparseable) is rejected
fn normalize_image_url(page_url: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(rest) = raw.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}"))
            .ok()
            .map(|u| u.to_string());
    }

    match Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Some(u.to_string()),
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            page_url.join(raw).ok().map(|u| u.to_string())
        }
        Err(_) => None,
    }
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ImageError> {
    use futures::StreamExt;

    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ImageError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ImageError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ImageError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ImageError::InvalidUtf8)
}
