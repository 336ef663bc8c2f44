pub mod sqlite;

use std::collections::BTreeSet;

use crate::app::Result;
use crate::domain::Source;

pub use sqlite::SqliteStore;

/// Durable backend for the source registry, the dedup set and settings.
///
/// Implementations must make every method atomic with respect to the others.
pub trait Store {
    // Source operations
    fn add_source(&self, source: &Source) -> Result<()>;
    fn get_source(&self, name: &str) -> Result<Option<Source>>;
    fn get_all_sources(&self) -> Result<Vec<Source>>;
    /// Set one filter dimension, leaving the other as stored.
    /// Returns false when no source has that name.
    fn set_quality(&self, name: &str, quality: Option<&str>) -> Result<bool>;
    /// Returns false when no source has that name.
    fn set_uploaders(&self, name: &str, uploaders: &BTreeSet<String>) -> Result<bool>;
    /// Returns false when no source has that name.
    fn delete_source(&self, name: &str) -> Result<bool>;

    // Dedup operations
    fn is_delivered(&self, id: &str) -> Result<bool>;
    /// Record `id` and, when `retain` is set, prune the oldest ids beyond it.
    /// Returns the number of pruned ids.
    fn mark_delivered(&self, id: &str, retain: Option<usize>) -> Result<usize>;
    fn delivered_count(&self) -> Result<usize>;

    // Settings
    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}
