use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::app::error::Result;
use crate::config::Config;
use crate::dedup::DedupStore;
use crate::enrich::Enricher;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::parallel::ParallelFetcher;
use crate::fetcher::Fetcher;
use crate::notifier::{FormatOptions, Notifier, TelegramNotifier};
use crate::registry::SourceRegistry;
use crate::scheduler::{load_interval, Pipeline};
use crate::store::sqlite::SqliteStore;

pub const DB_FILE: &str = "herald.db";

/// Everything a command or the daemon needs, wired from one [`Config`].
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub registry: SourceRegistry,
    pub dedup: Arc<DedupStore>,
    pub http: Arc<HttpFetcher>,
    pub parallel_fetcher: Arc<ParallelFetcher>,
    pub enricher: Arc<Enricher>,
}

impl AppContext {
    /// Open (or recover) the database in the configured data directory.
    pub fn new(config: Config) -> Result<Self> {
        let db_path = Self::db_path(&config)?;
        let store = Arc::new(SqliteStore::open_or_recover(&db_path)?);
        tracing::debug!("Using database {}", db_path.display());
        Self::build(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::build(config, store)
    }

    pub fn db_path(config: &Config) -> Result<PathBuf> {
        Ok(config.resolve_data_dir()?.join(DB_FILE))
    }

    fn build(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let http = Arc::new(HttpFetcher::new(&config.http)?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> = http.clone();

        let parallel_fetcher = Arc::new(ParallelFetcher::with_workers(
            fetcher.clone(),
            config.poll.workers,
        ));
        let enricher = Arc::new(Enricher::new(fetcher, &config.enrichment));
        let registry = SourceRegistry::new(store.clone());
        let dedup = Arc::new(DedupStore::new(store.clone(), config.dedup.max_entries));

        Ok(Self {
            config,
            store,
            registry,
            dedup,
            http,
            parallel_fetcher,
            enricher,
        })
    }

    /// The operator-set interval, or `poll.interval_secs` if none was set.
    pub fn poll_interval(&self) -> Result<Duration> {
        let fallback = Duration::from_secs(self.config.poll.interval_secs.max(1));
        load_interval(self.store.as_ref(), fallback)
    }

    /// Fails when the Telegram credentials are missing.
    pub fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        let timeout = Duration::from_secs(self.config.http.timeout_secs.max(1));
        let notifier = TelegramNotifier::new(self.http.client(), &self.config.telegram, timeout)?;
        Ok(Arc::new(notifier))
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        let pipeline = Pipeline::new(
            self.registry.clone(),
            self.dedup.clone(),
            self.parallel_fetcher.clone(),
            self.enricher.clone(),
            self.notifier()?,
        )
        .with_format(FormatOptions::from(&self.config.telegram))
        .with_max_rate_limit_wait(Duration::from_secs(
            self.config.poll.max_rate_limit_wait_secs,
        ));
        Ok(pipeline)
    }
}
