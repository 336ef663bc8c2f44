use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::config::TelegramConfig;
use crate::domain::EnrichedEntry;
use crate::notifier::{LinkButton, Message, SendOptions};

pub const UNKNOWN_SIZE: &str = "Unknown size";
pub const UNKNOWN_CATEGORY: &str = "Unknown category";

#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Links as URL buttons instead of inline anchors.
    pub inline_buttons: bool,
    pub disable_link_preview: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            inline_buttons: true,
            disable_link_preview: true,
        }
    }
}

impl From<&TelegramConfig> for FormatOptions {
    fn from(config: &TelegramConfig) -> Self {
        Self {
            inline_buttons: config.inline_buttons,
            disable_link_preview: config.disable_link_preview,
        }
    }
}

fn is_web_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn hashtag(id: &str) -> Option<String> {
    let tag_safe = !id.is_empty() && id.chars().all(|c| c.is_alphanumeric() || c == '_');
    tag_safe.then(|| format!("#{}", id))
}

/// Render an entry as an HTML message.
///
/// Magnet links go in the text: Telegram only accepts web URLs on buttons.
pub fn render(enriched: &EnrichedEntry, options: &FormatOptions) -> Message {
    let entry = &enriched.entry;
    let details = &enriched.details;

    let mut lines = vec![
        format!("🎥 <b>{}</b>", encode_text(entry.display_title())),
        format!(
            "📦 Size: {}",
            encode_text(details.size.as_deref().unwrap_or(UNKNOWN_SIZE))
        ),
    ];

    if details.seeders.is_some() || details.leechers.is_some() {
        lines.push(format!(
            "🌱 Seeders: {} · Leechers: {}",
            encode_text(details.seeders.as_deref().unwrap_or("?")),
            encode_text(details.leechers.as_deref().unwrap_or("?"))
        ));
    }

    let category = encode_text(details.category.as_deref().unwrap_or(UNKNOWN_CATEGORY));
    match hashtag(&entry.id) {
        Some(tag) => lines.push(format!("{} {}", tag, category)),
        None => lines.push(category.to_string()),
    }

    if let Some(magnet) = &details.magnet {
        lines.push(format!("🧲 <code>{}</code>", encode_text(magnet)));
    }

    let torrent = details.torrent_link.as_deref().filter(|u| is_web_url(u));
    let page = Some(entry.link.as_str()).filter(|u| is_web_url(u));

    let mut buttons = Vec::new();
    if options.inline_buttons {
        let row: Vec<LinkButton> = torrent
            .map(|url| LinkButton::new("🔗 Download Torrent", url))
            .into_iter()
            .chain(page.map(|url| LinkButton::new("🌐 View Page", url)))
            .collect();
        if !row.is_empty() {
            buttons.push(row);
        }
    } else {
        let anchors: Vec<String> = torrent
            .map(|url| {
                format!(
                    "🔗 <a href=\"{}\">Download Torrent</a>",
                    encode_double_quoted_attribute(url)
                )
            })
            .into_iter()
            .chain(page.map(|url| {
                format!(
                    "🌐 <a href=\"{}\">View Page</a>",
                    encode_double_quoted_attribute(url)
                )
            }))
            .collect();
        if !anchors.is_empty() {
            lines.push(anchors.join(" | "));
        }
    }

    Message {
        text: lines.join("\n"),
        buttons,
        options: SendOptions {
            disable_link_preview: options.disable_link_preview,
            rich_formatting: true,
        },
    }
}
