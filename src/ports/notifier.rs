use async_trait::async_trait;

/// Human-readable status sink.
///
/// Delivery is best-effort: implementations log their own failures and never
/// surface them to the trading path.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn send(&self, message: &str);
}
