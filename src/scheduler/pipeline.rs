use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::dedup::DedupStore;
use crate::domain::{FeedEntry, Source};
use crate::enrich::Enricher;
use crate::fetcher::parallel::ParallelFetcher;
use crate::filter::{self, Verdict};
use crate::notifier::{render, DeliveryError, FormatOptions, Message, Notifier};
use crate::registry::SourceRegistry;

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub sources_polled: usize,
    /// Ids delivered this cycle, in delivery order.
    pub delivered: Vec<String>,
    pub skipped: usize,
    pub failed_sources: Vec<String>,
    /// Ids whose delivery failed; they stay eligible for the next cycle.
    pub failed_deliveries: Vec<String>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn summary(&self) -> String {
        format!(
            "{} delivered, {} skipped, {} failed deliveries, {}/{} sources failed",
            self.delivered.len(),
            self.skipped,
            self.failed_deliveries.len(),
            self.failed_sources.len(),
            self.sources_polled + self.failed_sources.len()
        )
    }
}

/// One poll cycle: fetch every source, filter, enrich, deliver, record.
///
/// Cycles are serialized by an internal lock, so a manual check and a
/// scheduled one never touch the dedup store at the same time.
pub struct Pipeline {
    registry: SourceRegistry,
    dedup: Arc<DedupStore>,
    fetcher: Arc<ParallelFetcher>,
    enricher: Arc<Enricher>,
    notifier: Arc<dyn Notifier>,
    format: FormatOptions,
    max_rate_limit_wait: Duration,
    cycle_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        registry: SourceRegistry,
        dedup: Arc<DedupStore>,
        fetcher: Arc<ParallelFetcher>,
        enricher: Arc<Enricher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            dedup,
            fetcher,
            enricher,
            notifier,
            format: FormatOptions::default(),
            max_rate_limit_wait: Duration::from_secs(30),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    /// Longest `retry_after` honoured before giving up on an entry until
    /// the next cycle.
    pub fn with_max_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.max_rate_limit_wait = wait;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run one cycle. Never fails: every per-source and per-entry error is
    /// logged and counted in the report.
    pub async fn run(&self, cancel: &CancellationToken) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;
        let started = Instant::now();
        let mut report = CycleReport::default();

        let sources = match self.registry.list() {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!("Failed to load sources: {}", e);
                return report;
            }
        };

        if sources.is_empty() {
            tracing::debug!("No sources configured");
            return report;
        }

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return report;
            }
            results = self.fetcher.fetch_all(sources) => results,
        };

        'sources: for (source, result) in results {
            let entries = match result {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Skipping {} this cycle: {}", source.name, e);
                    report.failed_sources.push(source.name);
                    continue;
                }
            };
            report.sources_polled += 1;

            for entry in entries {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'sources;
                }
                self.process_entry(&source, entry, cancel, &mut report).await;
            }
        }

        report.elapsed = started.elapsed();
        if report.cancelled {
            tracing::info!("Poll cycle cancelled: {}", report.summary());
        } else {
            tracing::info!(
                "Poll cycle complete: {} ({:.1}s)",
                report.summary(),
                report.elapsed.as_secs_f64()
            );
        }
        report
    }

    async fn process_entry(
        &self,
        source: &Source,
        entry: FeedEntry,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) {
        match filter::evaluate(&entry, &source.filters, &self.dedup) {
            Ok(Verdict::Eligible) => {}
            Ok(verdict) => {
                tracing::debug!("Skipping {} from {}: {}", entry.id, source.name, verdict);
                report.skipped += 1;
                return;
            }
            Err(e) => {
                tracing::error!("Dedup lookup failed for {}: {}", entry.id, e);
                report.failed_deliveries.push(entry.id);
                return;
            }
        }

        let id = entry.id.clone();
        let title = entry.display_title().to_string();

        let enriched = self.enricher.enrich(entry).await;
        let message = render(&enriched, &self.format);

        match self.deliver(&message, cancel).await {
            Ok(()) => {
                if let Err(e) = self.dedup.record(&id) {
                    tracing::error!("Failed to persist delivered id {}: {}", id, e);
                }
                tracing::info!("Posted: {}", title);
                report.delivered.push(id);
            }
            Err(e) => {
                tracing::warn!("Failed to deliver {} ({}): {}", id, title, e);
                report.failed_deliveries.push(id);
            }
        }
    }

    /// Send once, and once more after a short rate-limit pause.
    async fn deliver(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Result<(), DeliveryError> {
        match self.notifier.send(message).await {
            Err(DeliveryError::RateLimited { retry_after })
                if retry_after <= self.max_rate_limit_wait =>
            {
                tracing::warn!("Rate limited, retrying in {:?}", retry_after);
                tokio::select! {
                    _ = tokio::time::sleep(retry_after) => {}
                    _ = cancel.cancelled() => {
                        return Err(DeliveryError::RateLimited { retry_after });
                    }
                }
                self.notifier.send(message).await
            }
            other => other,
        }
    }
}
