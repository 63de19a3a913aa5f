//! Notification sinks
//!
//! Every sink is best-effort: failures are logged and never reach the
//! trading path.

pub mod discord;
pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AlertsSection;
use crate::ports::NotificationPort;

pub use discord::DiscordNotifier;
pub use telegram::TelegramNotifier;

/// Delivery failure of a remote sink. Only ever logged.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Rejected by service: {0}")]
    Rejected(String),
}

/// Writes each notification to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn send(&self, message: &str) {
        info!(target: "notify", "{}", message);
    }
}

/// Forwards each notification to every inner sink, in order
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn NotificationPort>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationPort>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Log sink plus whichever remote sinks are enabled and configured
    pub fn from_alerts(alerts: &AlertsSection) -> Self {
        let mut fanout = Self::new().with_sink(Arc::new(LogNotifier));

        if alerts.telegram_enabled {
            match alerts.get_telegram_bot_token() {
                Some(token) if !alerts.telegram_chat_id.is_empty() => {
                    match TelegramNotifier::new(&token, alerts.telegram_chat_id.clone()) {
                        Ok(t) => fanout = fanout.with_sink(Arc::new(t)),
                        Err(e) => warn!("Telegram notifier disabled: {}", e),
                    }
                }
                _ => warn!("Telegram enabled but bot token or chat id missing"),
            }
        }

        if alerts.discord_enabled {
            match alerts.get_discord_webhook_url() {
                Some(url) => match DiscordNotifier::new(url) {
                    Ok(d) => fanout = fanout.with_sink(Arc::new(d)),
                    Err(e) => warn!("Discord notifier disabled: {}", e),
                },
                None => warn!("Discord enabled but webhook URL missing"),
            }
        }

        fanout
    }
}

#[async_trait]
impl NotificationPort for FanoutNotifier {
    async fn send(&self, message: &str) {
        for sink in &self.sinks {
            sink.send(message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::RecordingNotifier;

    #[tokio::test]
    async fn test_fanout_delivers_to_all() {
        let a = Arc::new(RecordingNotifier::new());
        let b = Arc::new(RecordingNotifier::new());
        let fanout = FanoutNotifier::new()
            .with_sink(a.clone())
            .with_sink(Arc::new(LogNotifier))
            .with_sink(b.clone());

        fanout.send("SELL DOGEUSDT placed").await;

        assert_eq!(a.get_messages(), vec!["SELL DOGEUSDT placed".to_string()]);
        assert_eq!(b.get_messages(), vec!["SELL DOGEUSDT placed".to_string()]);
    }

    #[test]
    fn test_rejection_message() {
        let err = NotifyError::Rejected("chat not found".into());
        assert_eq!(err.to_string(), "Rejected by service: chat not found");
    }

    #[test]
    fn test_from_alerts_defaults_to_log_only() {
        let fanout = FanoutNotifier::from_alerts(&AlertsSection::default());
        assert_eq!(fanout.len(), 1);
    }

    #[test]
    fn test_from_alerts_with_telegram() {
        let alerts = AlertsSection {
            telegram_enabled: true,
            telegram_bot_token: "123:abc".into(),
            telegram_chat_id: "42".into(),
            ..Default::default()
        };
        assert_eq!(FanoutNotifier::from_alerts(&alerts).len(), 2);
    }

    #[test]
    fn test_from_alerts_skips_incomplete_telegram() {
        let alerts = AlertsSection {
            telegram_enabled: true,
            telegram_bot_token: "123:abc".into(),
            ..Default::default()
        };
        assert_eq!(FanoutNotifier::from_alerts(&alerts).len(), 1);
    }
}
