use async_trait::async_trait;
use thiserror::Error;

use crate::domain::trade::{OrderId, OrderRequest};

/// Exchange refused an order. Carries the exchange's reason verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct OrderRejected {
    pub reason: String,
}

impl OrderRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("API request failed: {0}")]
    ApiError(String),
}

/// Order placement and open-order status
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    /// Place a limit order. Transport failures are reported as rejections too,
    /// the lifecycle treats both the same way.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, OrderRejected>;

    /// Ids of orders still open on `pair`
    async fn open_orders(&self, pair: &str) -> Result<Vec<OrderId>, ExecutionError>;
}
