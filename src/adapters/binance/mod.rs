//! Binance spot REST adapter
//!
//! Implements market data, execution and balance ports.

pub mod client;
pub mod types;

pub use client::{BinanceClient, BinanceConfig, BinanceError};
