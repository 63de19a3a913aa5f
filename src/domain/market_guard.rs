//! Market Guard
//!
//! Entry gate based on how far the best bid sits from the recent
//! volume-weighted average price. A large gap is treated as volatility (or a
//! thin book) and the trade is skipped.

use std::sync::Arc;

use crate::ports::market_data::{MarketDataError, MarketDataPort};

/// Default acceptance threshold (0.6%)
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.006;

/// Market state observed when evaluating an entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    /// Highest resting bid
    pub best_bid: f64,
    /// Volume-weighted average price
    pub average_price: f64,
    /// `abs((average - bid) / average)`
    pub deviation: f64,
    /// `deviation < threshold`
    pub safe: bool,
}

#[derive(Clone)]
pub struct MarketGuard {
    market: Arc<dyn MarketDataPort>,
    acceptance_threshold: f64,
}

impl MarketGuard {
    pub fn new(market: Arc<dyn MarketDataPort>) -> Self {
        Self::with_threshold(market, DEFAULT_ACCEPTANCE_THRESHOLD)
    }

    pub fn with_threshold(market: Arc<dyn MarketDataPort>, acceptance_threshold: f64) -> Self {
        Self {
            market,
            acceptance_threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.acceptance_threshold
    }

    /// Pure rule: deviation of `best_bid` from `average_price`.
    ///
    /// A zero, negative or non-finite average is malformed market data.
    pub fn check(
        &self,
        pair: &str,
        best_bid: f64,
        average_price: f64,
    ) -> Result<MarketSnapshot, MarketDataError> {
        if !average_price.is_finite() || average_price <= 0.0 {
            return Err(MarketDataError::InvalidAveragePrice {
                pair: pair.to_string(),
                value: average_price,
            });
        }
        if !best_bid.is_finite() {
            return Err(MarketDataError::Parse(format!(
                "non-finite best bid for {}",
                pair
            )));
        }

        let deviation = ((average_price - best_bid) / average_price).abs();
        Ok(MarketSnapshot {
            best_bid,
            average_price,
            deviation,
            safe: deviation < self.acceptance_threshold,
        })
    }

    /// Fetch bid and average for `pair` and apply the rule.
    pub async fn evaluate(&self, pair: &str) -> Result<MarketSnapshot, MarketDataError> {
        let best_bid = self.market.best_bid(pair).await?;
        let average_price = self.market.average_price(pair).await?;
        self.check(pair, best_bid, average_price)
    }

    pub async fn is_safe_to_enter(&self, pair: &str) -> Result<bool, MarketDataError> {
        Ok(self.evaluate(pair).await?.safe)
    }
}

impl std::fmt::Debug for MarketGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketGuard")
            .field("acceptance_threshold", &self.acceptance_threshold)
            .finish()
    }
}
