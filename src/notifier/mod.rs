//! Formatting and delivery of notifications.
//!
//! - [`format::render`] turns an [`EnrichedEntry`](crate::domain::EnrichedEntry) into a [`Message`]
//! - [`Notifier`] delivers a [`Message`] to the configured destination
//! - [`TelegramNotifier`](telegram::TelegramNotifier) is the Bot API implementation

pub mod format;
pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use format::{render, FormatOptions};
pub use telegram::TelegramNotifier;

/// The destination did not accept a message. The entry stays eligible and is
/// retried next cycle.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("notifier not configured: {0}")]
    NotConfigured(String),
}

impl DeliveryError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DeliveryError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub disable_link_preview: bool,
    /// Text is HTML rather than plain.
    pub rich_formatting: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            disable_link_preview: true,
            rich_formatting: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
    /// Rows of URL buttons shown under the message.
    pub buttons: Vec<Vec<LinkButton>>,
    pub options: SendOptions,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError>;
}
