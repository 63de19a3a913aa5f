use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
    #[error("API request failed: {0}")]
    ApiError(String),
}

/// Free (available) balance lookup
#[async_trait]
pub trait BalancePort: Send + Sync {
    async fn balance(&self, asset: &str) -> Result<f64, BalanceError>;
}
