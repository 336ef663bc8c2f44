//! # Herald
//!
//! Polls torrent and syndication feeds and posts new entries that match each
//! source's filters to a Telegram channel, exactly once per entry.
//!
//! ## Architecture
//!
//! ```text
//! Scheduler → Fetcher → Normalizer → Filter (+ Dedup) → Enricher → Notifier → Dedup
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Add a source, only 1080p releases from two uploaders
//! herald source add nyaa "https://nyaa.si/?page=rss&q=show" -q 1080p -u ToonsHub -u SubsPlease
//!
//! # Poll every 10 minutes
//! herald interval 10m
//!
//! # Run the poller
//! herald daemon start --log ~/herald.log
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components
/// from a [`Config`](config::Config).
pub mod app;

/// Command-line interface using clap.
///
/// - `source add|remove|list` - manage feed sources
/// - `filter <name>` - quality and uploader filters
/// - `interval [VALUE]` - show or set the poll interval
/// - `check` - poll once now
/// - `daemon start|stop|status` - background poller
/// - `seen` - size of the dedup store
pub mod cli;

/// Configuration loaded from `~/.config/herald/config.toml` with
/// environment overrides for secrets.
pub mod config;

/// Foreground poller with PID file and signal handling.
pub mod daemon;

/// Delivered-id set with count-based retention.
pub mod dedup;

/// Core domain models.
///
/// - [`Source`](domain::Source): a named feed URL with its filters
/// - [`FeedEntry`](domain::FeedEntry): one entry, identified by a stable id
/// - [`EnrichedEntry`](domain::EnrichedEntry): an entry plus display details
pub mod domain;

/// Optional page scraping for size, category and magnet link.
pub mod enrich;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for fetching a URL
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`ParallelFetcher`](fetcher::parallel::ParallelFetcher): Bounded concurrent fetching
pub mod fetcher;

/// Eligibility checks: dedup, quality token, uploader.
pub mod filter;

/// Feed parsing and normalization.
///
/// RSS 2.0 (with namespaced extensions), Atom and JSON Feed into
/// [`FeedEntry`](domain::FeedEntry) values.
pub mod normalizer;

pub mod notifier;

/// Source registry on top of the store.
pub mod registry;

pub mod scheduler;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

#[cfg(test)]
mod testing;
