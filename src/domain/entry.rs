use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Well-known metadata keys, lowercased local names of feed extension elements.
pub mod meta {
    pub const SIZE: &str = "size";
    pub const SEEDERS: &str = "seeders";
    pub const LEECHERS: &str = "leechers";
    pub const INFO_HASH: &str = "infohash";
    pub const CATEGORY: &str = "category";
    pub const UPLOADER: &str = "uploader";
}

/// One entry from a feed, rebuilt on every poll.
///
/// Equality and hashing only consider `id`, so the same entry seen on two
/// different polls compares equal even if its seeder counts moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    /// Canonical page link for the entry.
    pub link: String,
    /// Direct download link when the feed carries one separately.
    pub download_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
}

impl PartialEq for FeedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FeedEntry {}

impl Hash for FeedEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl FeedEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
            download_url: None,
            published_at: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Derive a stable identifier for an entry.
    ///
    /// The feed's own guid wins: its trailing numeric path segment
    /// (`/view/123456`, `/download/123456.torrent`) when it has one, else the
    /// raw guid. Without a guid, the link's numeric segment is used, and
    /// finally a SHA256 of the link.
    pub fn derive_id(guid: Option<&str>, link: &str) -> String {
        let guid = guid.map(str::trim).filter(|g| !g.is_empty());

        if let Some(guid) = guid {
            return numeric_segment(guid).unwrap_or_else(|| guid.to_string());
        }
        if let Some(id) = numeric_segment(link) {
            return id;
        }

        let mut hasher = Sha256::new();
        hasher.update(link.trim().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Non-empty metadata value for `key`.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn magnet_link(&self) -> Option<String> {
        let hash = self.meta(meta::INFO_HASH)?;
        let name: String = url::form_urlencoded::byte_serialize(self.title.as_bytes()).collect();
        Some(format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            hash.to_lowercase(),
            name
        ))
    }

    /// Direct `.torrent` link, either from the feed or derived from a
    /// `/view/<id>` page link.
    pub fn torrent_link(&self) -> Option<String> {
        if let Some(url) = self.download_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }

        let mut url = Url::parse(&self.link).ok()?;
        let segments: Vec<String> = url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        match segments.as_slice() {
            [view, id] if view == "view" && is_numeric(id) => {
                url.set_path(&format!("/download/{}.torrent", id));
                url.set_query(None);
                url.set_fragment(None);
                Some(url.to_string())
            }
            _ => None,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn numeric_segment(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let last = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let last = last.strip_suffix(".torrent").unwrap_or(last);
    is_numeric(last).then(|| last.to_string())
}

/// Supplementary fields shown in a notification.
///
/// Filled from feed metadata first; page enrichment only fills the gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryDetails {
    pub size: Option<String>,
    pub category: Option<String>,
    pub magnet: Option<String>,
    pub torrent_link: Option<String>,
    pub seeders: Option<String>,
    pub leechers: Option<String>,
}

impl EntryDetails {
    pub fn from_entry(entry: &FeedEntry) -> Self {
        let owned = |key: &str| entry.meta(key).map(String::from);
        Self {
            size: owned(meta::SIZE),
            category: owned(meta::CATEGORY),
            magnet: entry.magnet_link(),
            torrent_link: entry.torrent_link(),
            seeders: owned(meta::SEEDERS),
            leechers: owned(meta::LEECHERS),
        }
    }

    /// True when nothing is left for page enrichment to find.
    pub fn is_complete(&self) -> bool {
        self.size.is_some() && self.category.is_some() && self.magnet.is_some()
    }

    /// Fill empty fields from `other`, never overwriting feed-provided values.
    pub fn merge_missing(&mut self, other: EntryDetails) {
        self.size = self.size.take().or(other.size);
        self.category = self.category.take().or(other.category);
        self.magnet = self.magnet.take().or(other.magnet);
        self.torrent_link = self.torrent_link.take().or(other.torrent_link);
        self.seeders = self.seeders.take().or(other.seeders);
        self.leechers = self.leechers.take().or(other.leechers);
    }
}

/// An entry ready to be formatted for delivery.
#[derive(Debug, Clone)]
pub struct EnrichedEntry {
    pub entry: FeedEntry,
    pub details: EntryDetails,
}

impl EnrichedEntry {
    pub fn from_feed(entry: FeedEntry) -> Self {
        let details = EntryDetails::from_entry(&entry);
        Self { entry, details }
    }
}
