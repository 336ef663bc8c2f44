use chrono::{DateTime, Utc};
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::domain::{meta, FeedEntry};
use crate::fetcher::FetchError;

/// Turns a raw feed body into [`FeedEntry`] values in document order.
///
/// RSS 2.0 goes through the `rss` crate so namespaced extension elements
/// (`nyaa:size`, `nyaa:infoHash`, ...) are kept as metadata. Anything `rss`
/// rejects (Atom, JSON Feed, RSS 1.0) is handed to `feed-rs`.
#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, body: &[u8]) -> Result<Vec<FeedEntry>, FetchError> {
        match rss::Channel::read_from(body) {
            Ok(channel) => Ok(channel.items().iter().filter_map(from_rss_item).collect()),
            Err(rss_err) => {
                tracing::debug!("Not an RSS 2.0 document ({}), trying feed-rs", rss_err);
                let feed = parser::parse(body).map_err(|e| FetchError::Parse(e.to_string()))?;
                Ok(feed.entries.into_iter().filter_map(from_feed_rs_entry).collect())
            }
        }
    }
}

fn decode(s: &str) -> String {
    decode_html_entities(s.trim()).to_string()
}

fn from_rss_item(item: &rss::Item) -> Option<FeedEntry> {
    let link = item.link().map(str::trim).filter(|l| !l.is_empty());
    let guid = item.guid().filter(|g| !g.value().trim().is_empty());

    let permalink = guid
        .filter(|g| g.is_permalink() && g.value().starts_with("http"))
        .map(|g| g.value().trim());

    let page_link = permalink.or(link).or_else(|| guid.map(|g| g.value().trim()));
    let Some(page_link) = page_link else {
        tracing::debug!("Skipping RSS item without link or guid: {:?}", item.title());
        return None;
    };

    let id = FeedEntry::derive_id(guid.map(|g| g.value()), link.unwrap_or(page_link));
    let mut entry = FeedEntry::new(id, item.title().map(decode).unwrap_or_default(), page_link);

    entry.download_url = link.filter(|l| *l != page_link).map(String::from);
    entry.published_at = item
        .pub_date()
        .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc));

    for elements in item.extensions().values() {
        for (name, values) in elements {
            if let Some(value) = values.first().and_then(|v| v.value()) {
                let value = value.trim();
                if !value.is_empty() {
                    entry.metadata.insert(name.to_lowercase(), value.to_string());
                }
            }
        }
    }

    let creator = item
        .dublin_core_ext()
        .and_then(|dc| dc.creators().first().cloned())
        .or_else(|| item.author().map(String::from));
    if let Some(creator) = creator.filter(|c| !c.trim().is_empty()) {
        entry
            .metadata
            .entry(meta::UPLOADER.to_string())
            .or_insert_with(|| creator.trim().to_string());
    }

    Some(entry)
}

fn from_feed_rs_entry(item: feed_rs::model::Entry) -> Option<FeedEntry> {
    let link = item.links.first().map(|l| l.href.trim().to_string());
    let guid = Some(item.id.as_str()).filter(|id| !id.trim().is_empty());

    let page_link = link.clone().or_else(|| guid.map(String::from))?;
    let id = FeedEntry::derive_id(guid, &page_link);
    let title = item.title.as_ref().map(|t| decode(&t.content)).unwrap_or_default();

    let mut entry = FeedEntry::new(id, title, page_link);
    entry.published_at = item.published.or(item.updated).map(|dt| dt.with_timezone(&Utc));

    if let Some(author) = item.authors.first().filter(|a| !a.name.trim().is_empty()) {
        entry
            .metadata
            .insert(meta::UPLOADER.to_string(), author.name.trim().to_string());
    }
    if let Some(category) = item.categories.first() {
        let label = category.label.clone().unwrap_or_else(|| category.term.clone());
        entry.metadata.insert(meta::CATEGORY.to_string(), label);
    }

    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NYAA_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" xmlns:nyaa="https://nyaa.si/xmlns/nyaa" version="2.0">
  <channel>
    <title>Nyaa - Home - Torrent File RSS</title>
    <description>RSS Feed for Home</description>
    <link>https://nyaa.si/</link>
    <item>
      <title>[ToonsHub] Show S01E01 1080p WEB-DL</title>
      <link>https://nyaa.si/download/123456.torrent</link>
      <guid isPermaLink="true">https://nyaa.si/view/123456</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 -0000</pubDate>
      <nyaa:seeders>120</nyaa:seeders>
      <nyaa:leechers>8</nyaa:leechers>
      <nyaa:infoHash>0123456789abcdef0123456789abcdef01234567</nyaa:infoHash>
      <nyaa:category>Anime - English-translated</nyaa:category>
      <nyaa:size>1.4 GiB</nyaa:size>
    </item>
    <item>
      <title>Show &amp; Friends S02E03 [720p]</title>
      <link>https://nyaa.si/download/123457.torrent</link>
      <guid isPermaLink="true">https://nyaa.si/view/123457</guid>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test Feed</title>
  <id>urn:test:feed</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Atom Entry 1</title>
    <link href="https://example.com/posts/77"/>
    <id>urn:test:entry-1</id>
    <author><name>ToonsHub</name></author>
    <updated>2024-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_nyaa_rss() {
        let entries = Normalizer::new().normalize(NYAA_SAMPLE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id, "123456");
        assert_eq!(first.title, "[ToonsHub] Show S01E01 1080p WEB-DL");
        assert_eq!(first.link, "https://nyaa.si/view/123456");
        assert_eq!(
            first.download_url.as_deref(),
            Some("https://nyaa.si/download/123456.torrent")
        );
        assert_eq!(first.meta(meta::SIZE), Some("1.4 GiB"));
        assert_eq!(first.meta(meta::SEEDERS), Some("120"));
        assert_eq!(first.meta(meta::LEECHERS), Some("8"));
        assert_eq!(first.meta(meta::CATEGORY), Some("Anime - English-translated"));
        assert!(first.meta(meta::INFO_HASH).is_some());
        assert!(first.published_at.is_some());
    }

    #[test]
    fn test_titles_are_entity_decoded() {
        let entries = Normalizer::new().normalize(NYAA_SAMPLE.as_bytes()).unwrap();
        assert_eq!(entries[1].title, "Show & Friends S02E03 [720p]");
        assert_eq!(entries[1].meta(meta::SIZE), None);
    }

    #[test]
    fn test_parse_atom_falls_back_to_feed_rs() {
        let entries = Normalizer::new().normalize(ATOM_SAMPLE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "urn:test:entry-1");
        assert_eq!(entries[0].title, "Atom Entry 1");
        assert_eq!(entries[0].link, "https://example.com/posts/77");
        assert_eq!(entries[0].meta(meta::UPLOADER), Some("ToonsHub"));
    }

    #[test]
    fn test_items_sharing_a_link_keep_their_guids() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Comments</title>
    <link>https://example.com/</link>
    <description>Comments on item 42</description>
    <item>
      <title>First comment</title>
      <link>https://example.com/item/42</link>
      <guid isPermaLink="false">comment-a</guid>
    </item>
    <item>
      <title>Second comment</title>
      <link>https://example.com/item/42</link>
      <guid isPermaLink="false">comment-b</guid>
    </item>
  </channel>
</rss>"#;
        let entries = Normalizer::new().normalize(body.as_bytes()).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["comment-a", "comment-b"]);
    }

    #[test]
    fn test_ids_are_stable_across_parses() {
        let normalizer = Normalizer::new();
        let first = normalizer.normalize(NYAA_SAMPLE.as_bytes()).unwrap();
        let second = normalizer.normalize(NYAA_SAMPLE.as_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let result = Normalizer::new().normalize(b"definitely not xml");
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }
}
