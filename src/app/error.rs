use thiserror::Error;

use crate::config::ConfigError;
use crate::fetcher::FetchError;
use crate::notifier::DeliveryError;
use crate::scheduler::SchedulerError;

#[derive(Error, Debug)]
pub enum HeraldError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Source already exists: {0}")]
    SourceExists(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HeraldError>;
