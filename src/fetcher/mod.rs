pub mod http_fetcher;
pub mod parallel;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failure to obtain or parse a feed. The source is skipped for this cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Feed parsing error: {0}")]
    Parse(String),

    #[error("Fetch task failed: {0}")]
    Task(String),
}

/// Plain HTTP GET with a bounded timeout, used for feeds and entry pages.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
