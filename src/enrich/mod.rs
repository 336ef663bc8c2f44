//! Optional page enrichment.
//!
//! When the feed itself lacks the size, category or magnet link of an entry,
//! the entry's page is fetched and scraped for them. Any failure here is
//! logged and the entry is delivered with whatever the feed had.
//!
//! ```text
//! FeedEntry → (feed metadata) → EntryDetails → page scrape fills gaps → EnrichedEntry
//! ```

mod page;

pub use page::{parse_page, PageDetails};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::EnrichmentConfig;
use crate::domain::{EnrichedEntry, EntryDetails, FeedEntry};
use crate::fetcher::{FetchError, Fetcher};

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("page fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("page fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("page parsing failed: {0}")]
    Parse(String),
}

pub struct Enricher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    timeout: Duration,
    enabled: bool,
}

impl Enricher {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>, config: &EnrichmentConfig) -> Self {
        Self {
            fetcher,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            enabled: config.enabled,
        }
    }

    pub fn disabled(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self {
            fetcher,
            timeout: Duration::from_secs(1),
            enabled: false,
        }
    }

    /// Build the delivery view of `entry`. Never fails.
    pub async fn enrich(&self, entry: FeedEntry) -> EnrichedEntry {
        let mut details = EntryDetails::from_entry(&entry);

        if !self.enabled || details.is_complete() {
            return EnrichedEntry { entry, details };
        }

        match self.scrape(&entry.link).await {
            Ok(page) => details.merge_missing(page.into()),
            Err(e) => tracing::warn!(
                "Enrichment failed for {} ({}), sending with feed data only",
                entry.id,
                e
            ),
        }

        EnrichedEntry { entry, details }
    }

    async fn scrape(&self, url: &str) -> Result<PageDetails, EnrichmentError> {
        let body = tokio::time::timeout(self.timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| EnrichmentError::Timeout(self.timeout))??;

        let html = String::from_utf8_lossy(&body);
        parse_page(&html)
    }
}

impl From<PageDetails> for EntryDetails {
    fn from(page: PageDetails) -> Self {
        EntryDetails {
            size: page.size,
            category: page.category,
            magnet: page.magnet,
            torrent_link: page.torrent_link,
            seeders: page.seeders,
            leechers: page.leechers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::meta;
    use crate::testing::{StubFetcher, NYAA_VIEW_PAGE};

    fn config() -> EnrichmentConfig {
        EnrichmentConfig {
            enabled: true,
            timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn test_enrich_fills_missing_fields_from_page() {
        let stub = StubFetcher::new();
        stub.respond("https://nyaa.si/view/123456", NYAA_VIEW_PAGE);
        let enricher = Enricher::new(Arc::new(stub), &config());

        let entry = FeedEntry::new(
            "123456",
            "[ToonsHub] Show 1080p",
            "https://nyaa.si/view/123456",
        );
        let enriched = enricher.enrich(entry).await;

        assert_eq!(enriched.details.size.as_deref(), Some("1.4 GiB"));
        assert_eq!(
            enriched.details.category.as_deref(),
            Some("Anime - English-translated")
        );
        assert!(enriched
            .details
            .magnet
            .as_deref()
            .unwrap()
            .starts_with("magnet:?xt=urn:btih:"));
    }

    #[tokio::test]
    async fn test_enrich_skips_page_when_feed_is_complete() {
        let stub = Arc::new(StubFetcher::new());
        let enricher = Enricher::new(stub.clone(), &config());

        let entry = FeedEntry::new("1", "Show", "https://nyaa.si/view/1")
            .with_meta(meta::SIZE, "700 MiB")
            .with_meta(meta::CATEGORY, "Anime")
            .with_meta(meta::INFO_HASH, "abc");
        let enriched = enricher.enrich(entry).await;

        assert_eq!(stub.calls(), 0);
        assert_eq!(enriched.details.size.as_deref(), Some("700 MiB"));
    }

    #[tokio::test]
    async fn test_enrich_failure_keeps_entry() {
        let stub = StubFetcher::new();
        stub.fail("https://nyaa.si/view/9", 500);
        let enricher = Enricher::new(Arc::new(stub), &config());

        let entry =
            FeedEntry::new("9", "Show", "https://nyaa.si/view/9").with_meta(meta::SEEDERS, "4");
        let enriched = enricher.enrich(entry).await;

        assert_eq!(enriched.entry.id, "9");
        assert_eq!(enriched.details.size, None);
        assert_eq!(enriched.details.magnet, None);
        assert_eq!(enriched.details.seeders.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_enrich_times_out() {
        let stub = StubFetcher::new();
        stub.respond_slowly("https://nyaa.si/view/5", NYAA_VIEW_PAGE, Duration::from_secs(5));
        let enricher = Enricher::new(
            Arc::new(stub),
            &EnrichmentConfig {
                enabled: true,
                timeout_secs: 1,
            },
        );

        let started = std::time::Instant::now();
        let enriched = enricher
            .enrich(FeedEntry::new("5", "Show", "https://nyaa.si/view/5"))
            .await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(enriched.details.size, None);
    }

    #[tokio::test]
    async fn test_disabled_enricher_never_fetches() {
        let stub = Arc::new(StubFetcher::new());
        let enricher = Enricher::disabled(stub.clone());

        enricher
            .enrich(FeedEntry::new("1", "Show", "https://nyaa.si/view/1"))
            .await;
        assert_eq!(stub.calls(), 0);
    }
}
