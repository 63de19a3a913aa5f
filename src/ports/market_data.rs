use async_trait::async_trait;
use thiserror::Error;

/// Market data error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Unknown trading pair: {0}")]
    UnknownPair(String),

    #[error("Invalid average price for {pair}: {value}")]
    InvalidAveragePrice { pair: String, value: f64 },

    #[error("Empty order book for {0}")]
    EmptyOrderBook(String),

    #[error("REST API error: {0}")]
    RestError(String),

    #[error("Data parsing error: {0}")]
    Parse(String),
}

/// Market data port trait
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Highest resting bid for `pair`
    async fn best_bid(&self, pair: &str) -> Result<f64, MarketDataError>;

    /// Volume-weighted average price over the provider's recent window
    async fn average_price(&self, pair: &str) -> Result<f64, MarketDataError>;
}
