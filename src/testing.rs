//! Test doubles and fixtures shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use html_escape::encode_text;

use crate::fetcher::{FetchError, Fetcher};
use crate::notifier::{DeliveryError, Message, Notifier};

#[derive(Clone)]
enum Canned {
    Body(Vec<u8>),
    Status(u16),
    Slow(Vec<u8>, Duration),
}

/// In-memory [`Fetcher`] answering from canned responses. Unknown URLs are 404.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Canned>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, body: impl Into<String>) {
        self.set(url, Canned::Body(body.into().into_bytes()));
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.set(url, Canned::Status(status));
    }

    pub fn respond_slowly(&self, url: &str, body: impl Into<String>, delay: Duration) {
        self.set(url, Canned::Slow(body.into().into_bytes(), delay));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set(&self, url: &str, canned: Canned) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), canned);
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let canned = self.responses.lock().unwrap().get(url).cloned();

        match canned {
            Some(Canned::Body(body)) => Ok(body),
            Some(Canned::Slow(body, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            Some(Canned::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// [`Notifier`] that records every accepted message.
///
/// Messages whose text contains a registered pattern are rejected, and a
/// one-shot rate limit can be armed for the next send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Message>>,
    failing: Mutex<Vec<String>>,
    rate_limit: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_matching(&self, pattern: &str) {
        self.failing.lock().unwrap().push(pattern.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn rate_limit_once(&self, retry_after: Duration) {
        *self.rate_limit.lock().unwrap() = Some(retry_after);
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of accepted messages whose text contains `needle`.
    pub fn sent_containing(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.text.contains(needle))
            .count()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(retry_after) = self.rate_limit.lock().unwrap().take() {
            return Err(DeliveryError::RateLimited { retry_after });
        }

        let rejected = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|p| message.text.contains(p.as_str()));
        if rejected {
            return Err(DeliveryError::Api {
                code: 400,
                description: "Bad Request: rejected by test".to_string(),
            });
        }

        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Bind a local TCP server that accepts connections and never answers.
/// Returns its base URL.
pub async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    format!("http://{}", addr)
}

/// A nyaa-style RSS document. Every item carries size, category and info
/// hash, so page enrichment never needs to run for it.
pub fn nyaa_feed(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(id, title)| {
            format!(
                r#"
    <item>
      <title>{title}</title>
      <link>https://nyaa.si/download/{id}.torrent</link>
      <guid isPermaLink="true">https://nyaa.si/view/{id}</guid>
      <nyaa:seeders>10</nyaa:seeders>
      <nyaa:leechers>1</nyaa:leechers>
      <nyaa:infoHash>{hash:0>40}</nyaa:infoHash>
      <nyaa:category>Anime - English-translated</nyaa:category>
      <nyaa:size>700 MiB</nyaa:size>
    </item>"#,
                title = encode_text(title),
                id = id,
                hash = id,
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" xmlns:nyaa="https://nyaa.si/xmlns/nyaa" version="2.0">
  <channel>
    <title>Nyaa - Home - Torrent File RSS</title>
    <description>RSS Feed for Home</description>
    <link>https://nyaa.si/</link>{items}
  </channel>
</rss>"#
    )
}

pub const NYAA_VIEW_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><title>[ToonsHub] Show 1080p :: Nyaa</title></head>
<body>
<div class="container">
  <div class="panel panel-success">
    <div class="panel-heading">
      <h3 class="panel-title">[ToonsHub] Show 1080p</h3>
    </div>
    <div class="panel-body">
      <div class="row">
        <div class="col-md-1">Category:</div>
        <div class="col-md-5">
          <a href="/?c=1_0">Anime</a> - <a href="/?c=1_2">English-translated</a>
        </div>
        <div class="col-md-1">Date:</div>
        <div class="col-md-5">2024-01-01 00:00 UTC</div>
      </div>
      <div class="row">
        <div class="col-md-1">Submitter:</div>
        <div class="col-md-5"><a class="text-success" href="/user/ToonsHub">ToonsHub</a></div>
        <div class="col-md-1">Seeders:</div>
        <div class="col-md-5"><span style="color: green;">120</span></div>
      </div>
      <div class="row">
        <div class="col-md-1">Information:</div>
        <div class="col-md-5">No information.</div>
        <div class="col-md-1">Leechers:</div>
        <div class="col-md-5"><span style="color: red;">8</span></div>
      </div>
      <div class="row">
        <div class="col-md-1">File size:</div>
        <div class="col-md-5">1.4 GiB</div>
        <div class="col-md-1">Completed:</div>
        <div class="col-md-5">512</div>
      </div>
    </div>
    <div class="panel-footer clearfix">
      <a href="/download/123456.torrent"><i class="fa fa-download fa-fw"></i>Download Torrent</a> or
      <a href="magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&amp;dn=Show" class="card-footer-item"><i class="fa fa-magnet fa-fw"></i>Magnet</a>
    </div>
  </div>
</div>
</body>
</html>"#;
