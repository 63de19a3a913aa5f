use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use super::NotifyError;
use crate::ports::NotificationPort;

/// sendMessage text limit
pub const TELEGRAM_MAX_CHARS: usize = 4096;

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: String,
}

/// Telegram Bot API `sendMessage`
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    api_url: String,
    chat_id: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            api_url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
            chat_id: chat_id.into(),
            client,
        })
    }

    pub fn payload(&self, message: &str) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.chat_id,
            "text": truncate(message, TELEGRAM_MAX_CHARS),
            "disable_web_page_preview": true,
        })
    }

    async fn deliver(&self, message: &str) -> Result<(), NotifyError> {
        let response: TelegramResponse = self
            .client
            .post(&self.api_url)
            .json(&self.payload(message))
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(NotifyError::Rejected(response.description));
        }
        debug!("Telegram message sent");
        Ok(())
    }
}

#[async_trait]
impl NotificationPort for TelegramNotifier {
    async fn send(&self, message: &str) {
        if let Err(e) = self.deliver(message).await {
            error!("Failed to send Telegram message: {}", e);
        }
    }
}

/// Cut to at most `max` characters
pub(crate) fn truncate(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload() {
        let notifier = TelegramNotifier::new("123:abc", "-10042").unwrap();
        let payload = notifier.payload("BUY DOGEUSDT placed");
        assert_eq!(payload["chat_id"], "-10042");
        assert_eq!(payload["text"], "BUY DOGEUSDT placed");
        assert!(notifier.api_url.ends_with("/bot123:abc/sendMessage"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "ééé");
        let long = "x".repeat(TELEGRAM_MAX_CHARS + 10);
        assert_eq!(truncate(&long, TELEGRAM_MAX_CHARS).len(), TELEGRAM_MAX_CHARS);
    }
}
