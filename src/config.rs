//! Configuration for the bot.
//!
//! Two sources, read once at startup and immutable thereafter:
//!
//! - A TOML config file (optional — a missing file yields
//!   [`Config::default`], which mirrors the original deployment: three AI
//!   news feeds, hourly polling, a 10 second inter-post delay).
//! - Required credentials from the process environment (`BOT_TOKEN`,
//!   `CHANNEL_ID`, `OPENAI_API_KEY`). A missing credential aborts startup
//!   with a diagnostic naming the variable, instead of surfacing later as a
//!   mysterious authentication failure inside a polling pass.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::util::{validate_url, UrlValidationError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed URL '{url}': {source}")]
    InvalidFeedUrl {
        url: String,
        source: UrlValidationError,
    },

    #[error("Config declares an empty feed list")]
    NoFeeds,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Missing required environment variable {0} (set it before starting the bot)")]
    Missing(&'static str),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One configured feed: a display name plus the RSS/Atom URL.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to the values in [`Config::default`].
/// Timeouts and limits are named fields here rather than literals at call
/// sites, so one file is the single place operational tuning happens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feeds polled each pass, in order.
    pub feeds: Vec<FeedSource>,

    /// Newest entries taken from each feed per pass.
    pub entries_per_feed: usize,

    /// Seconds slept between polling passes.
    pub poll_interval_secs: u64,

    /// Seconds slept between successive channel posts within one pass.
    pub inter_post_delay_secs: u64,

    /// Request timeout for feed fetches, in seconds.
    pub feed_timeout_secs: u64,

    /// Request timeout for article page fetches (image scraping), in seconds.
    pub page_timeout_secs: u64,

    /// OpenAI model used for summaries.
    pub summary_model: String,

    /// Stock images used when no image can be scraped from the article page.
    pub fallback_images: Vec<String>,

    /// SQLite file tracking already-published links.
    pub database_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: vec![
                FeedSource {
                    name: "AI News".to_string(),
                    url: "https://www.artificialintelligence-news.com/feed/".to_string(),
                },
                FeedSource {
                    name: "VentureBeat AI".to_string(),
                    url: "https://venturebeat.com/category/ai/feed/".to_string(),
                },
                FeedSource {
                    name: "The Verge AI".to_string(),
                    url: "https://www.theverge.com/artificial-intelligence/rss/index.xml"
                        .to_string(),
                },
            ],
            entries_per_feed: 3,
            poll_interval_secs: 3600,
            inter_post_delay_secs: 10,
            feed_timeout_secs: 10,
            page_timeout_secs: 8,
            summary_model: "gpt-4o-mini".to_string(),
            fallback_images: vec![
                "https://source.unsplash.com/600x400/?ai".to_string(),
                "https://source.unsplash.com/600x400/?robot".to_string(),
                "https://source.unsplash.com/600x400/?neural-network".to_string(),
                "https://source.unsplash.com/600x400/?machine-learning".to_string(),
                "https://source.unsplash.com/600x400/?technology".to_string(),
            ],
            database_path: "newswire.db".to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted (serde default behavior), logged as warning
    /// - Any feed URL failing validation → `Err(ConfigError::InvalidFeedUrl)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to bound memory on a corrupted file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to warn about probable typos
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "feeds",
                "entries_per_feed",
                "poll_interval_secs",
                "inter_post_delay_secs",
                "feed_timeout_secs",
                "page_timeout_secs",
                "summary_model",
                "fallback_images",
                "database_path",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            interval_secs = config.poll_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject configurations that would fail deep inside a polling pass.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }
        for feed in &self.feeds {
            validate_url(&feed.url).map_err(|source| ConfigError::InvalidFeedUrl {
                url: feed.url.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Secrets and identifiers read from the environment at startup.
///
/// Tokens are wrapped in [`SecretString`] so they cannot leak through Debug
/// or error formatting; the Telegram channel id is not a secret and stays a
/// plain string.
pub struct Credentials {
    pub bot_token: SecretString,
    pub channel_id: String,
    pub openai_api_key: SecretString,
}

impl Credentials {
    /// Read all required credentials, failing fast on the first missing one.
    pub fn from_env() -> Result<Self, CredentialError> {
        Ok(Self {
            bot_token: SecretString::from(require_env("BOT_TOKEN")?),
            channel_id: require_env("CHANNEL_ID")?,
            openai_api_key: SecretString::from(require_env("OPENAI_API_KEY")?),
        })
    }
}

/// Mask token fields in Debug output to prevent secret leakage in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("openai_api_key", &"[REDACTED]")
            .finish()
    }
}

fn require_env(name: &'static str) -> Result<String, CredentialError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(CredentialError::Missing(name))
}

// ============================================================================
// Tests
// ============================================================================
