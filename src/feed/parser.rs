use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// One normalized syndication item from a fetched feed.
///
/// Transient: constructed per fetch cycle; only `dedup_key` outlives the
/// cycle (in the seen store).
#[derive(Debug, Clone)]
pub struct Entry {
    pub title: String,
    pub link: Option<String>,
    pub published: DateTime<Utc>,
    /// Identity used for dedup: the trimmed link, or a hash fallback when
    /// the feed carries no usable link.
    pub dedup_key: String,
}

/// Parse RSS/Atom bytes into entries, in document order.
///
/// Entries without a publish or update date are stamped with `fetched_at` so
/// downstream formatting always has a timestamp.
pub fn parse_entries(bytes: &[u8], fetched_at: DateTime<Utc>) -> Result<Vec<Entry>> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|h| !h.is_empty());
            let published = entry.published.or(entry.updated).unwrap_or(fetched_at);
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());
            let dedup_key = dedup_key(link.as_deref(), &title);

            Entry {
                title,
                link,
                published,
                dedup_key,
            }
        })
        .collect();

    Ok(entries)
}

/// The link is the canonical identity. Feeds that omit links get a stable
/// hash of title+link so distinct items still produce distinct keys.
fn dedup_key(link: Option<&str>, title: &str) -> String {
    if let Some(link) = link {
        let trimmed = link.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!("{}|{}", title, link.unwrap_or(""));
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fetch_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_rss_with_link_and_date() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
    <item>
        <title>First post</title>
        <link>https://example.com/first</link>
        <pubDate>Wed, 01 May 2024 09:30:00 GMT</pubDate>
    </item>
</channel></rss>"#;

        let entries = parse_entries(rss.as_bytes(), fetch_time()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "First post");
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/first"));
        assert_eq!(entries[0].dedup_key, "https://example.com/first");
        assert_eq!(
            entries[0].published,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_date_defaults_to_fetch_time() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
    <item><title>Undated</title><link>https://example.com/undated</link></item>
</channel></rss>"#;

        let entries = parse_entries(rss.as_bytes(), fetch_time()).unwrap();
        assert_eq!(entries[0].published, fetch_time());
    }

    #[test]
    fn test_missing_link_uses_hash_key() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
    <item><title>No link here</title></item>
</channel></rss>"#;

        let entries = parse_entries(rss.as_bytes(), fetch_time()).unwrap();
        assert_eq!(entries[0].link, None);
        // SHA-256 hex
        assert_eq!(entries[0].dedup_key.len(), 64);
        assert!(entries[0].dedup_key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_keys_distinct_for_distinct_titles() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
    <item><title>Alpha</title></item>
    <item><title>Beta</title></item>
</channel></rss>"#;

        let entries = parse_entries(rss.as_bytes(), fetch_time()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].dedup_key, entries[1].dedup_key);
    }

    #[test]
    fn test_parse_atom_feed() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Atom Feed</title>
    <id>urn:feed</id>
    <updated>2024-05-01T00:00:00Z</updated>
    <entry>
        <title>Atom entry</title>
        <id>urn:entry-1</id>
        <link href="https://example.com/atom-1"/>
        <updated>2024-05-02T10:00:00Z</updated>
    </entry>
</feed>"#;

        let entries = parse_entries(atom.as_bytes(), fetch_time()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Atom entry");
        assert_eq!(entries[0].dedup_key, "https://example.com/atom-1");
    }

    #[test]
    fn test_invalid_xml_is_an_error() {
        assert!(parse_entries(b"<not a feed", fetch_time()).is_err());
    }

    #[test]
    fn test_untitled_entry_gets_placeholder() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
    <item><link>https://example.com/untitled</link></item>
</channel></rss>"#;

        let entries = parse_entries(rss.as_bytes(), fetch_time()).unwrap();
        assert_eq!(entries[0].title, "Untitled");
    }
}
