//! Tweet Sniper - sentiment-driven Binance spot trading library
//!
//! Watches posts from followed accounts, and buys a tracked coin when a post
//! mentions it positively and the market is calm, then rests a take-profit sell.
//!
//! # Modules
//!
//! - `domain`: Core decisions (CoinMatcher, SentimentClassifier, MarketGuard, OrderSizer)
//! - `ports`: Trait abstractions (MarketDataPort, ExecutionPort, BalancePort, ...)
//! - `application`: TradeCoordinator, order lifecycles and their supervisor
//! - `adapters`: External implementations (Binance, Twitter, notifiers, CLI)
//! - `config`: Configuration loading and validation

pub mod domain;
pub mod ports;
pub mod application;
pub mod adapters;
pub mod config;
