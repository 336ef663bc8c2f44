use std::collections::BTreeSet;
use std::sync::Arc;

use url::Url;

use crate::app::{HeraldError, Result};
use crate::config::ConfigError;
use crate::domain::{FilterConfig, Source};
use crate::store::Store;

/// Named set of feeds to poll, with their filters.
///
/// Validation failures are reported as [`ConfigError::Invalid`] and leave the
/// stored state untouched.
#[derive(Clone)]
pub struct SourceRegistry {
    store: Arc<dyn Store + Send + Sync>,
}

impl SourceRegistry {
    pub fn new(store: Arc<dyn Store + Send + Sync>) -> Self {
        Self { store }
    }

    pub fn add(&self, name: &str, url: &str, filters: FilterConfig) -> Result<Source> {
        let name = validate_name(name)?;
        let url = validate_url(url)?;

        let source = Source::new(name, url).with_filters(filters);
        self.store.add_source(&source)?;
        tracing::info!("Added source {} ({})", source.name, source.url);
        Ok(source)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        if !self.store.delete_source(name.trim())? {
            return Err(HeraldError::SourceNotFound(name.to_string()));
        }
        tracing::info!("Removed source {}", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Source> {
        self.store
            .get_source(name.trim())?
            .ok_or_else(|| HeraldError::SourceNotFound(name.to_string()))
    }

    pub fn list(&self) -> Result<Vec<Source>> {
        self.store.get_all_sources()
    }

    /// Set or clear (`None`) the quality token of a source.
    pub fn set_quality(&self, name: &str, quality: Option<String>) -> Result<Source> {
        let name = name.trim();
        let filters = FilterConfig::new(quality, Vec::new());
        if !self.store.set_quality(name, filters.quality.as_deref())? {
            return Err(HeraldError::SourceNotFound(name.to_string()));
        }
        self.updated(name)
    }

    /// Replace the allowed uploaders of a source; an empty set allows all.
    pub fn set_uploaders(&self, name: &str, uploaders: BTreeSet<String>) -> Result<Source> {
        let name = name.trim();
        let filters = FilterConfig::new(None, uploaders);
        if !self.store.set_uploaders(name, &filters.uploaders)? {
            return Err(HeraldError::SourceNotFound(name.to_string()));
        }
        self.updated(name)
    }

    fn updated(&self, name: &str) -> Result<Source> {
        let source = self.get(name)?;
        tracing::info!("Updated filters for {}: {}", name, source.filters.describe());
        Ok(source)
    }
}

fn validate_name(name: &str) -> std::result::Result<&str, ConfigError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ConfigError::Invalid("source name must not be empty".into()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!(
            "source name must not contain whitespace: {:?}",
            name
        )));
    }
    Ok(name)
}

fn validate_url(url: &str) -> std::result::Result<String, ConfigError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| ConfigError::Invalid(format!("invalid feed URL {:?}: {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(ConfigError::Invalid(format!(
            "feed URL must be http or https, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn registry() -> SourceRegistry {
        SourceRegistry::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[test]
    fn test_add_list_remove() {
        let registry = registry();
        registry
            .add("nyaa", "https://nyaa.si/?page=rss", FilterConfig::default())
            .unwrap();

        let sources = registry.list().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://nyaa.si/?page=rss");

        registry.remove("nyaa").unwrap();
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_source() {
        let err = registry().remove("ghost").unwrap_err();
        assert!(matches!(err, HeraldError::SourceNotFound(_)));
    }

    #[test]
    fn test_invalid_input_leaves_state_unchanged() {
        let registry = registry();

        let err = registry
            .add("", "https://nyaa.si/?page=rss", FilterConfig::default())
            .unwrap_err();
        assert!(matches!(err, HeraldError::Config(ConfigError::Invalid(_))));

        let err = registry
            .add("nyaa", "ftp://nyaa.si/feed", FilterConfig::default())
            .unwrap_err();
        assert!(matches!(err, HeraldError::Config(ConfigError::Invalid(_))));

        let err = registry
            .add("nyaa", "not a url", FilterConfig::default())
            .unwrap_err();
        assert!(matches!(err, HeraldError::Config(ConfigError::Invalid(_))));

        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_set_quality_keeps_uploaders() {
        let registry = registry();
        registry
            .add(
                "nyaa",
                "https://nyaa.si/?page=rss",
                FilterConfig::new(None, vec!["ToonsHub".to_string()]),
            )
            .unwrap();

        let source = registry.set_quality("nyaa", Some("1080p".into())).unwrap();
        assert_eq!(source.filters.quality_token(), Some("1080p"));
        assert!(source.filters.uploaders.contains("ToonsHub"));

        let source = registry.set_quality("nyaa", None).unwrap();
        assert_eq!(source.filters.quality_token(), None);
    }

    #[test]
    fn test_set_uploaders_keeps_quality() {
        let registry = registry();
        registry
            .add(
                "nyaa",
                "https://nyaa.si/?page=rss",
                FilterConfig::new(Some("1080p".into()), Vec::new()),
            )
            .unwrap();

        let uploaders: BTreeSet<String> =
            ["ToonsHub", "varyg1001"].iter().map(|s| s.to_string()).collect();
        let source = registry.set_uploaders("nyaa", uploaders).unwrap();
        assert_eq!(source.filters.uploaders.len(), 2);
        assert_eq!(source.filters.quality_token(), Some("1080p"));
    }

    #[test]
    fn test_set_filter_on_missing_source() {
        let err = registry().set_quality("ghost", Some("1080p".into())).unwrap_err();
        assert!(matches!(err, HeraldError::SourceNotFound(_)));
    }
}
