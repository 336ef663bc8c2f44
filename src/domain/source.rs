use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-source filter configuration.
///
/// An empty dimension means "no restriction". Matching is case-insensitive on
/// both dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Substring that must appear in the entry title, e.g. `1080p`.
    pub quality: Option<String>,
    /// Uploader names allowed through; empty allows everyone.
    pub uploaders: BTreeSet<String>,
}

impl FilterConfig {
    pub fn new(quality: Option<String>, uploaders: impl IntoIterator<Item = String>) -> Self {
        Self {
            quality: quality
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            uploaders: uploaders
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
        }
    }

    pub fn quality_token(&self) -> Option<&str> {
        self.quality.as_deref().filter(|q| !q.is_empty())
    }

    pub fn is_unrestricted(&self) -> bool {
        self.quality_token().is_none() && self.uploaders.is_empty()
    }

    pub fn describe(&self) -> String {
        let quality = self.quality_token().unwrap_or("any");
        let uploaders = if self.uploaders.is_empty() {
            "any".to_string()
        } else {
            self.uploaders.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        format!("quality: {}, uploaders: {}", quality, uploaders)
    }
}

/// A named feed endpoint polled every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub filters: FilterConfig,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            filters: FilterConfig::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_filters(mut self, filters: FilterConfig) -> Self {
        self.filters = filters;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_config_trims_and_drops_empty_values() {
        let filters = FilterConfig::new(
            Some("  ".into()),
            vec![" ToonsHub ".to_string(), String::new()],
        );
        assert_eq!(filters.quality_token(), None);
        assert_eq!(filters.uploaders.len(), 1);
        assert!(filters.uploaders.contains("ToonsHub"));
    }

    #[test]
    fn test_unrestricted_filters() {
        assert!(FilterConfig::default().is_unrestricted());
        assert!(!FilterConfig::new(Some("1080p".into()), Vec::new()).is_unrestricted());
    }

    #[test]
    fn test_describe() {
        let filters = FilterConfig::new(
            Some("1080p".into()),
            vec!["varyg1001".to_string(), "ToonsHub".to_string()],
        );
        assert_eq!(
            filters.describe(),
            "quality: 1080p, uploaders: ToonsHub, varyg1001"
        );
        assert_eq!(
            FilterConfig::default().describe(),
            "quality: any, uploaders: any"
        );
    }
}
