//! Eligibility checks for a single entry.
//!
//! Checks run cheapest first and stop at the first rejection: already
//! delivered, then quality, then uploader.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::app::Result;
use crate::dedup::DedupStore;
use crate::domain::{meta, FeedEntry, FilterConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    AlreadyDelivered,
    QualityMismatch,
    UploaderMismatch,
}

impl Verdict {
    pub fn is_eligible(self) -> bool {
        self == Verdict::Eligible
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Eligible => "eligible",
            Verdict::AlreadyDelivered => "already delivered",
            Verdict::QualityMismatch => "quality not matched",
            Verdict::UploaderMismatch => "uploader not matched",
        };
        f.write_str(s)
    }
}

/// Full evaluation including the dedup lookup.
pub fn evaluate(entry: &FeedEntry, filters: &FilterConfig, dedup: &DedupStore) -> Result<Verdict> {
    if dedup.contains(&entry.id)? {
        return Ok(Verdict::AlreadyDelivered);
    }
    Ok(match_filters(entry, filters))
}

pub fn is_eligible(entry: &FeedEntry, filters: &FilterConfig, dedup: &DedupStore) -> Result<bool> {
    evaluate(entry, filters, dedup).map(Verdict::is_eligible)
}

/// Quality and uploader checks only.
pub fn match_filters(entry: &FeedEntry, filters: &FilterConfig) -> Verdict {
    if let Some(token) = filters.quality_token() {
        if !entry.title.to_lowercase().contains(&token.to_lowercase()) {
            return Verdict::QualityMismatch;
        }
    }

    if !filters.uploaders.is_empty() {
        let allowed = extract_uploader(entry).is_some_and(|uploader| {
            let uploader = uploader.to_lowercase();
            filters.uploaders.iter().any(|u| u.to_lowercase() == uploader)
        });
        if !allowed {
            return Verdict::UploaderMismatch;
        }
    }

    Verdict::Eligible
}

fn title_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*[\[(【]([^\])】]+)[\])】]").expect("uploader pattern is valid")
    })
}

/// The uploader of an entry.
///
/// Uses the `uploader` metadata field when the feed provides one, otherwise
/// the release-group tag at the start of the title (`[ToonsHub] Show ...`).
pub fn extract_uploader(entry: &FeedEntry) -> Option<String> {
    if let Some(uploader) = entry.meta(meta::UPLOADER) {
        return Some(uploader.to_string());
    }

    title_prefix_pattern()
        .captures(&entry.title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|u| !u.is_empty())
}
