//! Domain Layer - Core trading decisions for the sniper bot
//!
//! Pure decision logic; market access goes through the ports layer.
//!
//! - `coin_matcher`: keyword -> trading pair resolution
//! - `sentiment`: polarity scoring adjusted by the negative-word lexicon
//! - `market_guard`: best bid vs average price volatility gate
//! - `order_sizer`: fixed-fraction quantity sizing
//! - `trade`: trade intents, orders and lifecycle states

pub mod coin_matcher;
pub mod sentiment;
pub mod market_guard;
pub mod order_sizer;
pub mod trade;

pub use coin_matcher::{CoinMatcher, TrackedPairs};
pub use sentiment::{LexiconPolarity, NegativeLexicon, PolarityScorer, Sentiment, SentimentClassifier, SentimentScore};
pub use market_guard::{MarketGuard, MarketSnapshot, DEFAULT_ACCEPTANCE_THRESHOLD};
pub use order_sizer::{OrderSizer, DEFAULT_ALLOCATION_FRACTION};
pub use trade::{
    FailureReason, LifecycleReport, LifecycleState, OrderId, OrderRequest, OrderSide, TradeIntent,
    DEFAULT_SELL_MARKUP,
};
