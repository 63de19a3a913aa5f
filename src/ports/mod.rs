//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Market data (best bid, average price)
//! - Order execution (limit orders, open orders)
//! - Balances
//! - Notifications
//! - The stream of followed posts

pub mod market_data;
pub mod execution;
pub mod balance;
pub mod notifier;
pub mod text_source;
pub mod mocks;

// Re-export main traits and types
pub use market_data::{MarketDataError, MarketDataPort};
pub use execution::{ExecutionError, ExecutionPort, OrderRejected};
pub use balance::{BalanceError, BalancePort};
pub use notifier::NotificationPort;
pub use text_source::{SourceError, TextEvent, TextEventSource};
