use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::app::{HeraldError, Result};
use crate::store::Store;

/// Set of entry ids that have already been delivered.
///
/// Ids whose write to the backend failed are kept in memory, so a failed
/// write can cause at most a re-send after a restart, never within the same
/// run.
pub struct DedupStore {
    store: Arc<dyn Store + Send + Sync>,
    unpersisted: Mutex<HashSet<String>>,
    max_entries: Option<usize>,
}

impl DedupStore {
    /// `max_entries == 0` keeps every id forever.
    pub fn new(store: Arc<dyn Store + Send + Sync>, max_entries: usize) -> Self {
        Self {
            store,
            unpersisted: Mutex::new(HashSet::new()),
            max_entries: (max_entries > 0).then_some(max_entries),
        }
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        if self.unpersisted()?.contains(id) {
            return Ok(true);
        }
        self.store.is_delivered(id)
    }

    /// Mark `id` delivered and persist it.
    ///
    /// When persisting fails the id is still remembered for this process
    /// and the error is returned.
    pub fn record(&self, id: &str) -> Result<()> {
        match self.store.mark_delivered(id, self.max_entries) {
            Ok(pruned) => {
                if pruned > 0 {
                    tracing::debug!("Pruned {} old ids from the dedup store", pruned);
                }
                self.unpersisted()?.remove(id);
                Ok(())
            }
            Err(e) => {
                self.unpersisted()?.insert(id.to_string());
                Err(e)
            }
        }
    }

    pub fn len(&self) -> Result<usize> {
        self.store.delivered_count()
    }

    fn unpersisted(&self) -> Result<std::sync::MutexGuard<'_, HashSet<String>>> {
        self.unpersisted
            .lock()
            .map_err(|e| HeraldError::Other(format!("dedup lock poisoned: {}", e)))
    }
}
