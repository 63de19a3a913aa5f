//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, parse_config, AlertsSection, BinanceSection, Config, ConfigError, TradingSection,
    TwitterSection,
};
