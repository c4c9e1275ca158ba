//! The polling loop.
//!
//! Two states, forever: POLLING (one full pass over every configured feed)
//! and SLEEPING (fixed interval). A pass fetches each feed, filters out
//! links the channel has already seen, and runs each fresh article through
//! summarize → image → publish. Every failure class is contained below the
//! pass boundary; nothing that happens during a pass can stop the loop from
//! reaching its sleep.
//!
//! Articles are marked published only after Telegram confirms the send. A
//! failed send leaves the link unmarked, so the next pass picks the article
//! up again instead of silently dropping it.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::Config;
use crate::feed::{self, Article};
use crate::image::ImageResolver;
use crate::publish::{compose_caption, PublishError, TelegramClient};
use crate::storage::Database;
use crate::summarize::Summarizer;

/// Outcome counters for one polling pass, logged after every pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    /// Articles posted and marked published.
    pub published: usize,
    /// Articles skipped because their link was already published (or
    /// appeared twice within the same pass).
    pub duplicates: usize,
    /// Feeds that contributed zero entries because fetch/parse failed.
    pub feed_errors: usize,
    /// Articles whose send failed; they stay unmarked for the next pass.
    pub publish_failures: usize,
}

/// Owns the whole pipeline and drives it on a fixed interval.
pub struct Scheduler {
    config: Config,
    db: Database,
    client: reqwest::Client,
    summarizer: Summarizer,
    images: ImageResolver,
    telegram: TelegramClient,
}

impl Scheduler {
    pub fn new(
        config: Config,
        db: Database,
        client: reqwest::Client,
        summarizer: Summarizer,
        telegram: TelegramClient,
    ) -> Self {
        let images = ImageResolver::new(
            config.fallback_images.clone(),
            Duration::from_secs(config.page_timeout_secs),
        );
        Self {
            config,
            db,
            client,
            summarizer,
            images,
            telegram,
        }
    }

    /// Poll forever. Each pass is followed unconditionally by the sleep
    /// phase, whether it published anything, found nothing, or failed.
    pub async fn run(self) {
        loop {
            match self.run_pass().await {
                Ok(summary) => tracing::info!(
                    published = summary.published,
                    duplicates = summary.duplicates,
                    feed_errors = summary.feed_errors,
                    publish_failures = summary.publish_failures,
                    "Polling pass complete"
                ),
                Err(e) => tracing::error!(error = %e, "Polling pass failed"),
            }

            tracing::info!(
                secs = self.config.poll_interval_secs,
                "Sleeping until next pass"
            );
            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
        }
    }

    /// One full pass: collect fresh articles from every feed, then publish
    /// them in feed order with the configured delay between posts.
    pub async fn run_pass(&self) -> anyhow::Result<PassSummary> {
        let mut summary = PassSummary::default();
        let fresh = self.collect_new_articles(&mut summary).await?;

        for (i, article) in fresh.iter().enumerate() {
            if i > 0 && self.config.inter_post_delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(self.config.inter_post_delay_secs)).await;
            }

            match self.publish_article(article).await {
                Ok(()) => {
                    self.db.mark_published(&article.link, &article.title).await?;
                    summary.published += 1;
                    tracing::info!(title = %article.title, link = %article.link, "Posted article");
                }
                Err(e) => {
                    summary.publish_failures += 1;
                    tracing::warn!(
                        link = %article.link,
                        error = %e,
                        "Publish failed, leaving unmarked for the next pass"
                    );
                }
            }
        }

        Ok(summary)
    }

    /// Fetch every feed and keep the articles whose links the channel has
    /// not seen. One feed's failure only costs that feed's entries.
    async fn collect_new_articles(
        &self,
        summary: &mut PassSummary,
    ) -> anyhow::Result<Vec<Article>> {
        let timeout = Duration::from_secs(self.config.feed_timeout_secs);
        let mut fresh = Vec::new();
        // Guards against the same link appearing in two feeds (or twice in
        // one feed) within a single pass; the store only learns a link
        // after a confirmed send.
        let mut seen_this_pass = HashSet::new();

        for feed_source in &self.config.feeds {
            let articles = match feed::fetch_articles(
                &self.client,
                &feed_source.url,
                self.config.entries_per_feed,
                timeout,
            )
            .await
            {
                Ok(articles) => articles,
                Err(e) => {
                    summary.feed_errors += 1;
                    tracing::warn!(
                        feed = %feed_source.name,
                        url = %feed_source.url,
                        error = %e,
                        "Feed fetch failed, contributing zero entries this pass"
                    );
                    continue;
                }
            };

            for article in articles {
                if !seen_this_pass.insert(article.link.clone()) {
                    summary.duplicates += 1;
                    continue;
                }
                if self.db.is_published(&article.link).await? {
                    summary.duplicates += 1;
                    continue;
                }
                fresh.push(article);
            }
        }

        Ok(fresh)
    }

    async fn publish_article(&self, article: &Article) -> Result<(), PublishError> {
        // The summarizer must never see an empty input: articles without
        // an excerpt are summarized from their title.
        let input = if article.raw_summary.trim().is_empty() {
            article.title.as_str()
        } else {
            article.raw_summary.as_str()
        };

        let summary_text = self.summarizer.summarize(&self.client, input).await;
        let image_url = self.images.resolve(&self.client, &article.link).await;
        let caption = compose_caption(&article.title, &summary_text, &article.link);

        self.telegram
            .send_photo(&self.client, &image_url, &caption)
            .await
    }
}
