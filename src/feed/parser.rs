use feed_rs::parser;
use thiserror::Error;

/// One feed entry. `link` doubles as the deduplication key, so entries
/// without a link are dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Source-provided excerpt; empty string when the feed has none.
    pub raw_summary: String,
}

pub struct ParseResult {
    /// Articles in the feed's own order.
    pub articles: Vec<Article>,
    /// Entries dropped because they carried no link.
    pub skipped: usize,
}

#[derive(Debug, Error)]
#[error("Feed XML could not be parsed: {0}")]
pub struct ParseError(#[from] parser::ParseFeedError);

pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult, ParseError> {
    let feed = parser::parse(bytes)?;

    let mut articles = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0usize;

    for entry in feed.entries {
        let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
            skipped += 1;
            continue;
        };

        let title = entry
            .title
            .map(|t| t.content)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let raw_summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();

        articles.push(Article {
            title,
            link,
            raw_summary,
        });
    }

    Ok(ParseResult { articles, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>AI Wire</title>
    <item>
        <title>First story</title>
        <link>https://example.com/first</link>
        <description>Something happened in AI.</description>
    </item>
    <item>
        <title>Second story</title>
        <link>https://example.com/second</link>
    </item>
</channel></rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>AI Wire</title>
    <id>urn:feed</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <entry>
        <title>Atom story</title>
        <id>urn:1</id>
        <link href="https://example.com/atom-story"/>
        <updated>2024-01-01T00:00:00Z</updated>
        <summary>An atom excerpt.</summary>
    </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_preserves_order() {
        let result = parse_feed(RSS_SAMPLE.as_bytes()).unwrap();
        assert_eq!(result.articles.len(), 2);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.articles[0].title, "First story");
        assert_eq!(result.articles[0].link, "https://example.com/first");
        assert_eq!(result.articles[1].link, "https://example.com/second");
    }

    #[test]
    fn test_missing_summary_becomes_empty_string() {
        let result = parse_feed(RSS_SAMPLE.as_bytes()).unwrap();
        assert_eq!(result.articles[0].raw_summary, "Something happened in AI.");
        assert_eq!(result.articles[1].raw_summary, "");
    }

    #[test]
    fn test_parse_atom() {
        let result = parse_feed(ATOM_SAMPLE.as_bytes()).unwrap();
        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].title, "Atom story");
        assert_eq!(result.articles[0].link, "https://example.com/atom-story");
        assert_eq!(result.articles[0].raw_summary, "An atom excerpt.");
    }

    #[test]
    fn test_entry_without_link_is_skipped() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>No link here</title></item>
    <item><title>Linked</title><link>https://example.com/x</link></item>
</channel></rss>"#;
        let result = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.articles[0].title, "Linked");
    }

    #[test]
    fn test_missing_title_defaults_to_untitled() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><link>https://example.com/untitled</link></item>
</channel></rss>"#;
        let result = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(result.articles[0].title, "Untitled");
    }

    #[test]
    fn test_invalid_xml_is_an_error() {
        assert!(parse_feed(b"<not valid xml").is_err());
    }

    #[test]
    fn test_empty_channel_yields_no_articles() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel></channel></rss>"#;
        let result = parse_feed(xml.as_bytes()).unwrap();
        assert!(result.articles.is_empty());
        assert_eq!(result.skipped, 0);
    }
}
