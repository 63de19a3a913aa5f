use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Stream connection error: {0}")]
    ConnectionError(String),
    #[error("Stream rule setup failed: {0}")]
    RuleError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One post from a followed account
#[derive(Debug, Clone, PartialEq)]
pub struct TextEvent {
    pub author_id: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl TextEvent {
    pub fn new(author_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Stream of posts, already filtered down to the followed authors.
///
/// Events arrive in the source's order; the channel closes when the source
/// ends.
#[async_trait]
pub trait TextEventSource: Send + Sync {
    async fn subscribe(&self) -> Result<mpsc::Receiver<TextEvent>, SourceError>;
}
