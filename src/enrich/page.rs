use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::enrich::EnrichmentError;

/// Fields scraped from an entry page. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDetails {
    pub size: Option<String>,
    pub category: Option<String>,
    pub magnet: Option<String>,
    pub torrent_link: Option<String>,
    pub seeders: Option<String>,
    pub leechers: Option<String>,
}

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d+(?:[.,]\d+)?\s*(?:B|KiB|MiB|GiB|TiB|KB|MB|GB|TB)$")
            .expect("size pattern is valid")
    })
}

fn selector(css: &str) -> Result<Selector, EnrichmentError> {
    Selector::parse(css).map_err(|e| EnrichmentError::Parse(e.to_string()))
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `label:` → value pairs from two-column detail rows
/// (`<div class="col-md-1">File size:</div><div class="col-md-5">1.4 GiB</div>`).
fn labelled_values(doc: &Html) -> Result<HashMap<String, String>, EnrichmentError> {
    let label_selector = selector("div.row > div, tr > th, tr > td")?;
    let mut values = HashMap::new();

    for label in doc.select(&label_selector) {
        let text = normalize(&label.text().collect::<String>());
        let Some(key) = text.strip_suffix(':') else {
            continue;
        };

        let value = label
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .next()
            .map(|el| normalize(&el.text().collect::<String>()))
            .filter(|v| !v.is_empty());

        if let Some(value) = value {
            values.entry(key.to_lowercase()).or_insert(value);
        }
    }

    Ok(values)
}

fn find_size(
    doc: &Html,
    labels: &HashMap<String, String>,
) -> Result<Option<String>, EnrichmentError> {
    if let Some(size) = labels.get("file size").or_else(|| labels.get("size")) {
        return Ok(Some(size.clone()));
    }

    let cell_selector = selector("td, div, span")?;
    Ok(doc
        .select(&cell_selector)
        .map(|el| normalize(&el.text().collect::<String>()))
        .find(|text| size_pattern().is_match(text)))
}

fn find_category(
    doc: &Html,
    labels: &HashMap<String, String>,
) -> Result<Option<String>, EnrichmentError> {
    for css in [".panel-body a[href*=\"?c=\"]", "a[href*=\"?c=\"]"] {
        let links: Vec<String> = doc
            .select(&selector(css)?)
            .map(|a| normalize(&a.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();

        if !links.is_empty() {
            return Ok(Some(links.join(" - ")));
        }
    }

    Ok(labels.get("category").cloned())
}

fn first_href(doc: &Html, css: &str) -> Result<Option<String>, EnrichmentError> {
    Ok(doc
        .select(&selector(css)?)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .find(|href| !href.is_empty()))
}

/// Scrape size, category, magnet link and peer counts from an entry page.
pub fn parse_page(html: &str) -> Result<PageDetails, EnrichmentError> {
    let doc = Html::parse_document(html);
    let labels = labelled_values(&doc)?;

    let torrent_link =
        first_href(&doc, "a[href$=\".torrent\"]")?.filter(|href| href.starts_with("http"));

    Ok(PageDetails {
        size: find_size(&doc, &labels)?,
        category: find_category(&doc, &labels)?,
        magnet: first_href(&doc, "a[href^=\"magnet:\"]")?,
        torrent_link,
        seeders: labels.get("seeders").cloned(),
        leechers: labels.get("leechers").cloned(),
    })
}
