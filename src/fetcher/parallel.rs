use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::domain::{FeedEntry, Source};
use crate::fetcher::{FetchError, Fetcher};
use crate::normalizer::Normalizer;

pub const DEFAULT_WORKERS: usize = 4;

pub type SourceFetch = (Source, Result<Vec<FeedEntry>, FetchError>);

/// Fetches and normalizes several feeds concurrently, bounded by a semaphore.
///
/// Results come back in the same order as the sources went in.
pub struct ParallelFetcher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    normalizer: Normalizer,
    semaphore: Arc<Semaphore>,
}

impl ParallelFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher + Send + Sync>, workers: usize) -> Self {
        Self {
            fetcher,
            normalizer: Normalizer::new(),
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Fetch a single feed and normalize it into entries.
    pub async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        fetch_single_feed(&self.fetcher, &self.normalizer, url).await
    }

    pub async fn fetch_all(&self, sources: Vec<Source>) -> Vec<SourceFetch> {
        let mut handles = Vec::new();

        for source in sources {
            let fetcher = self.fetcher.clone();
            let semaphore = self.semaphore.clone();
            let normalizer = self.normalizer.clone();
            let url = source.url.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                fetch_single_feed(&fetcher, &normalizer, &url).await
            });

            handles.push((source, handle));
        }

        let (sources, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let outcomes = join_all(handles).await;

        sources
            .into_iter()
            .zip(outcomes)
            .map(|(source, outcome)| match outcome {
                Ok(result) => (source, result),
                Err(e) => {
                    tracing::error!("Task join error for source {}: {}", source.name, e);
                    (source, Err(FetchError::Task(e.to_string())))
                }
            })
            .collect()
    }
}

async fn fetch_single_feed(
    fetcher: &Arc<dyn Fetcher + Send + Sync>,
    normalizer: &Normalizer,
    url: &str,
) -> Result<Vec<FeedEntry>, FetchError> {
    let body = fetcher.fetch(url).await?;
    let entries = normalizer.normalize(&body)?;
    tracing::debug!("Parsed {} entries from {}", entries.len(), url);
    Ok(entries)
}
