//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Binance: spot REST client (market data, orders, balances)
//! - Paper: in-memory exchange for dry runs
//! - Twitter: v2 filtered stream of followed accounts
//! - Replay: recorded posts from a file
//! - Notify: log, Telegram and Discord sinks
//! - CLI: Command-line interface handlers

pub mod binance;
pub mod cli;
pub mod notify;
pub mod paper;
pub mod replay;
pub mod twitter;

pub use binance::BinanceClient;
pub use cli::CliApp;
pub use notify::{DiscordNotifier, FanoutNotifier, LogNotifier, TelegramNotifier};
pub use paper::PaperExchange;
pub use replay::ReplaySource;
pub use twitter::TwitterStream;
