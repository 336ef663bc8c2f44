use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::TelegramConfig;
use crate::notifier::{DeliveryError, Message, Notifier};

/// Used when a 429 response carries no `retry_after`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Telegram Bot API notifier posting to a single chat or channel.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl TelegramNotifier {
    pub fn new(
        client: Client,
        config: &TelegramConfig,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        if !config.is_configured() {
            return Err(DeliveryError::NotConfigured(
                "telegram.bot_token and telegram.chat_id are required".to_string(),
            ));
        }

        let endpoint = format!(
            "{}/bot{}/sendMessage",
            config.api_base.trim_end_matches('/'),
            config.bot_token.trim()
        );

        Ok(Self {
            client,
            endpoint,
            chat_id: config.chat_id.trim().to_string(),
            timeout,
        })
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    fn build_payload(&self, message: &Message) -> Value {
        let mut payload = json!({
            "chat_id": self.chat_id,
            "text": message.text,
            "link_preview_options": { "is_disabled": message.options.disable_link_preview },
            "disable_web_page_preview": message.options.disable_link_preview,
        });

        if message.options.rich_formatting {
            payload["parse_mode"] = json!("HTML");
        }
        if !message.buttons.is_empty() {
            payload["reply_markup"] = json!({ "inline_keyboard": message.buttons });
        }

        payload
    }
}

/// Map a Bot API response onto a delivery outcome.
fn classify_response(status: StatusCode, body: &str) -> Result<(), DeliveryError> {
    let parsed: ApiResponse = serde_json::from_str(body).unwrap_or_default();

    if status.is_success() && parsed.ok {
        return Ok(());
    }

    let code = parsed.error_code.unwrap_or(status.as_u16());
    if code == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        let retry_after = parsed
            .parameters
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Err(DeliveryError::RateLimited { retry_after });
    }

    let description = parsed.description.unwrap_or_else(|| {
        let snippet: String = body.chars().take(200).collect();
        if snippet.is_empty() {
            status.to_string()
        } else {
            snippet
        }
    });

    Err(DeliveryError::Api { code, description })
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        let payload = self.build_payload(message);

        // The endpoint embeds the bot token, so keep it out of errors.
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Http(e.without_url())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Http(e.without_url()))?;

        classify_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{LinkButton, SendOptions};

    fn config() -> TelegramConfig {
        TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "@herald_test".to_string(),
            ..TelegramConfig::default()
        }
    }

    fn notifier() -> TelegramNotifier {
        TelegramNotifier::new(Client::new(), &config(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_requires_credentials() {
        let result = TelegramNotifier::new(
            Client::new(),
            &TelegramConfig::default(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(DeliveryError::NotConfigured(_))));
    }

    #[test]
    fn test_endpoint_uses_api_base() {
        let mut config = config();
        config.api_base = "http://localhost:8081/".to_string();
        let notifier =
            TelegramNotifier::new(Client::new(), &config, Duration::from_secs(5)).unwrap();
        assert_eq!(notifier.endpoint, "http://localhost:8081/bot123:abc/sendMessage");
        assert_eq!(notifier.chat_id(), "@herald_test");
    }

    #[test]
    fn test_payload_with_buttons() {
        let message = Message {
            text: "<b>hi</b>".to_string(),
            buttons: vec![vec![LinkButton::new("View", "https://nyaa.si/view/1")]],
            options: SendOptions::default(),
        };
        let payload = notifier().build_payload(&message);

        assert_eq!(payload["chat_id"], "@herald_test");
        assert_eq!(payload["text"], "<b>hi</b>");
        assert_eq!(payload["parse_mode"], "HTML");
        assert_eq!(payload["link_preview_options"]["is_disabled"], true);
        assert_eq!(payload["disable_web_page_preview"], true);
        assert_eq!(
            payload["reply_markup"]["inline_keyboard"][0][0]["url"],
            "https://nyaa.si/view/1"
        );
    }

    #[test]
    fn test_payload_plain_text_without_buttons() {
        let message = Message {
            text: "hi".to_string(),
            buttons: Vec::new(),
            options: SendOptions {
                disable_link_preview: false,
                rich_formatting: false,
            },
        };
        let payload = notifier().build_payload(&message);

        assert!(payload.get("parse_mode").is_none());
        assert!(payload.get("reply_markup").is_none());
        assert_eq!(payload["disable_web_page_preview"], false);
    }

    #[test]
    fn test_classify_success() {
        let result = classify_response(StatusCode::OK, r#"{"ok":true,"result":{}}"#);
        assert!(result.is_ok());
    }

    #[test]
    fn test_classify_rate_limit() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#;
        let err = classify_response(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_classify_rate_limit_without_parameters() {
        let err = classify_response(StatusCode::TOO_MANY_REQUESTS, "").unwrap_err();
        assert_eq!(err.retry_after(), Some(DEFAULT_RETRY_AFTER));
    }

    #[test]
    fn test_classify_api_error() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        match classify_response(StatusCode::BAD_REQUEST, body) {
            Err(DeliveryError::Api { code, description }) => {
                assert_eq!(code, 400);
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_classify_non_json_error() {
        match classify_response(StatusCode::BAD_GATEWAY, "upstream down") {
            Err(DeliveryError::Api { code, description }) => {
                assert_eq!(code, 502);
                assert_eq!(description, "upstream down");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unanswered_send_times_out() {
        let config = TelegramConfig {
            api_base: crate::testing::silent_server().await,
            ..config()
        };
        let notifier =
            TelegramNotifier::new(Client::new(), &config, Duration::from_secs(1)).unwrap();
        let message = Message {
            text: "hi".to_string(),
            buttons: Vec::new(),
            options: SendOptions::default(),
        };

        let result = tokio::time::timeout(Duration::from_secs(5), notifier.send(&message))
            .await
            .expect("send should give up on its own");

        assert!(matches!(result, Err(DeliveryError::Timeout(t)) if t == Duration::from_secs(1)));
    }
}
