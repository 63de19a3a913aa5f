use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use super::telegram::truncate;
use super::NotifyError;
use crate::ports::NotificationPort;

/// Webhook `content` limit
pub const DISCORD_MAX_CHARS: usize = 2000;

/// Discord channel webhook
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    webhook_url: String,
    client: Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
        })
    }

    pub fn payload(message: &str) -> serde_json::Value {
        serde_json::json!({
            "username": "tweet-sniper",
            "content": truncate(message, DISCORD_MAX_CHARS),
        })
    }

    async fn deliver(&self, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(message))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{} - {}", status, body)));
        }
        debug!("Discord message sent");
        Ok(())
    }
}

#[async_trait]
impl NotificationPort for DiscordNotifier {
    async fn send(&self, message: &str) {
        if let Err(e) = self.deliver(message).await {
            error!("Failed to send Discord message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_truncates() {
        let long = "a".repeat(2500);
        let payload = DiscordNotifier::payload(&long);
        assert_eq!(payload["content"].as_str().unwrap().len(), DISCORD_MAX_CHARS);
        assert_eq!(payload["username"], "tweet-sniper");
    }
}
