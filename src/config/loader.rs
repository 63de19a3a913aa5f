//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.
//! Secrets may be left empty in the file and supplied through the environment.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::application::{CoordinatorSettings, LifecycleConfig};
use crate::domain::{NegativeLexicon, TrackedPairs};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trading: TradingSection,
    /// pair = "keyword, keyword", in file order
    pub coins: toml::Table,
    #[serde(default)]
    pub negative_words: HashMap<String, i64>,
    /// display name = user id
    #[serde(default)]
    pub followed_users: BTreeMap<String, String>,
    #[serde(default)]
    pub twitter: TwitterSection,
    #[serde(default)]
    pub binance: BinanceSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub alerts: AlertsSection,
}

/// Trade sizing and lifecycle parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingSection {
    /// Asset funding the buys
    pub quote_asset: String,
    /// Share of the quote balance per trade (0.10 = 10%)
    pub allocation_fraction: f64,
    /// Sell price multiplier over the buy price (1.15 = +15%)
    pub sell_markup: f64,
    /// Max relative distance between best bid and average price
    pub acceptance_threshold: f64,
    /// Open-orders poll interval while waiting for a buy fill
    pub poll_interval_secs: u64,
    /// Abandon the sell if the buy is still open after this long
    pub fill_timeout_secs: Option<u64>,
    /// Allow at most one running lifecycle per pair
    pub one_lifecycle_per_pair: bool,
    /// How long shutdown waits for running lifecycles
    pub shutdown_grace_secs: Option<u64>,
}

impl Default for TradingSection {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            allocation_fraction: crate::domain::DEFAULT_ALLOCATION_FRACTION,
            sell_markup: crate::domain::DEFAULT_SELL_MARKUP,
            acceptance_threshold: crate::domain::DEFAULT_ACCEPTANCE_THRESHOLD,
            poll_interval_secs: 5,
            fill_timeout_secs: None,
            one_lifecycle_per_pair: false,
            shutdown_grace_secs: None,
        }
    }
}

/// Twitter API v2 filtered stream
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterSection {
    /// App bearer token (or TWITTER_BEARER_TOKEN)
    pub bearer_token: String,
    pub api_url: String,
}

impl Default for TwitterSection {
    fn default() -> Self {
        Self {
            bearer_token: String::new(),
            api_url: "https://api.twitter.com/2".to_string(),
        }
    }
}

impl TwitterSection {
    /// Bearer token with TWITTER_BEARER_TOKEN fallback
    pub fn get_bearer_token(&self) -> Option<String> {
        non_empty(&self.bearer_token).or_else(|| std::env::var("TWITTER_BEARER_TOKEN").ok())
    }
}

/// Binance spot REST API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BinanceSection {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    /// Validate orders with /api/v3/order/test instead of placing them
    pub test_orders: bool,
    pub recv_window_ms: u64,
}

impl Default for BinanceSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: "https://api.binance.com".to_string(),
            test_orders: true,
            recv_window_ms: 5000,
        }
    }
}

impl BinanceSection {
    /// API key with BINANCE_API_KEY fallback
    pub fn get_api_key(&self) -> Option<String> {
        non_empty(&self.api_key).or_else(|| std::env::var("BINANCE_API_KEY").ok())
    }

    /// API secret with BINANCE_API_SECRET fallback
    pub fn get_api_secret(&self) -> Option<String> {
        non_empty(&self.api_secret).or_else(|| std::env::var("BINANCE_API_SECRET").ok())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Alerts configuration section (optional)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertsSection {
    /// Enable Discord webhook notifications
    #[serde(default)]
    pub discord_enabled: bool,
    /// Discord webhook URL
    #[serde(default)]
    pub discord_webhook_url: String,
    /// Enable Telegram notifications
    #[serde(default)]
    pub telegram_enabled: bool,
    /// Telegram bot token
    #[serde(default)]
    pub telegram_bot_token: String,
    /// Telegram chat ID
    #[serde(default)]
    pub telegram_chat_id: String,
}

impl AlertsSection {
    pub fn get_discord_webhook_url(&self) -> Option<String> {
        non_empty(&self.discord_webhook_url).or_else(|| std::env::var("DISCORD_WEBHOOK_URL").ok())
    }

    pub fn get_telegram_bot_token(&self) -> Option<String> {
        non_empty(&self.telegram_bot_token).or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok())
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let expanded = shellexpand::tilde(&path.as_ref().to_string_lossy()).to_string();
    let content = std::fs::read_to_string(expanded)?;
    parse_config(&content)
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trading;

        if !t.allocation_fraction.is_finite()
            || t.allocation_fraction <= 0.0
            || t.allocation_fraction > 1.0
        {
            return Err(ConfigError::ValidationError(format!(
                "allocation_fraction must be in (0, 1], got {}",
                t.allocation_fraction
            )));
        }

        if !t.sell_markup.is_finite() || t.sell_markup <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "sell_markup must be > 0, got {}",
                t.sell_markup
            )));
        }

        if !t.acceptance_threshold.is_finite()
            || t.acceptance_threshold <= 0.0
            || t.acceptance_threshold >= 1.0
        {
            return Err(ConfigError::ValidationError(format!(
                "acceptance_threshold must be in (0, 1), got {}",
                t.acceptance_threshold
            )));
        }

        if t.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if t.fill_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "fill_timeout_secs must be > 0 when set".to_string(),
            ));
        }

        if t.quote_asset.is_empty() {
            return Err(ConfigError::ValidationError(
                "quote_asset cannot be empty".to_string(),
            ));
        }

        if self.coins.is_empty() {
            return Err(ConfigError::ValidationError(
                "[coins] must list at least one pair".to_string(),
            ));
        }

        for (pair, keywords) in &self.coins {
            match keywords.as_str() {
                Some(k) if !k.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "coin {} must map to a non-empty keyword string",
                        pair
                    )))
                }
            }
        }

        // a word's polarity moves the averaged base score by at most 1, so a
        // penalty of at least 1 keeps adding a listed word from raising the net
        if let Some((word, weight)) = self.negative_words.iter().find(|(_, w)| **w < 1) {
            return Err(ConfigError::ValidationError(format!(
                "negative word '{}' must have weight >= 1, got {}",
                word, weight
            )));
        }

        if self.binance.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "binance base_url cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Keyword -> pair table in file order
    pub fn tracked_pairs(&self) -> TrackedPairs {
        TrackedPairs::from_config_rows(
            self.coins
                .iter()
                .filter_map(|(pair, keywords)| keywords.as_str().map(|k| (pair.as_str(), k))),
        )
    }

    pub fn negative_lexicon(&self) -> NegativeLexicon {
        self.negative_words
            .iter()
            .map(|(word, weight)| (word.as_str(), *weight))
            .collect()
    }

    pub fn followed_user_ids(&self) -> Vec<String> {
        self.followed_users.values().cloned().collect()
    }

    pub fn shutdown_grace(&self) -> Option<Duration> {
        self.trading.shutdown_grace_secs.map(Duration::from_secs)
    }
}

// Conversion from Config to CoordinatorSettings
impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        let t = &config.trading;
        CoordinatorSettings {
            quote_asset: t.quote_asset.clone(),
            allocation_fraction: t.allocation_fraction,
            sell_markup: t.sell_markup,
            acceptance_threshold: t.acceptance_threshold,
            one_lifecycle_per_pair: t.one_lifecycle_per_pair,
            lifecycle: LifecycleConfig {
                poll_interval: Duration::from_secs(t.poll_interval_secs),
                fill_timeout: t.fill_timeout_secs.map(Duration::from_secs),
            },
        }
    }
}
