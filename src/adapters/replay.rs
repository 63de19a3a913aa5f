//! File replay source
//!
//! Feeds recorded posts through the pipeline. One post per line:
//! `author_id<TAB>text`. Blank lines and lines starting with `#` are skipped.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::ports::{SourceError, TextEvent, TextEventSource};

#[derive(Debug, Clone)]
pub struct ReplaySource {
    path: PathBuf,
    followed: Option<HashSet<String>>,
    pace: Option<Duration>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            followed: None,
            pace: None,
        }
    }

    /// Only replay posts by these authors
    pub fn with_followed(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.followed = Some(ids.into_iter().collect());
        self
    }

    /// Delay between events
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    fn accepts(&self, author_id: &str) -> bool {
        self.followed
            .as_ref()
            .map_or(true, |ids| ids.contains(author_id))
    }
}

/// Parse one replay line
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return None;
    }
    let (author, text) = line.split_once('\t')?;
    let author = author.trim();
    (!author.is_empty()).then_some((author, text))
}

#[async_trait]
impl TextEventSource for ReplaySource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<TextEvent>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;

        let mut events = Vec::new();
        for (n, line) in content.lines().enumerate() {
            match parse_line(line) {
                Some((author, text)) if self.accepts(author) => {
                    events.push(TextEvent::new(author, text))
                }
                Some((author, _)) => {
                    warn!("Line {}: author {} is not followed, skipped", n + 1, author)
                }
                None if !line.trim().is_empty() && !line.trim_start().starts_with('#') => {
                    warn!("Line {}: expected author_id<TAB>text, skipped", n + 1)
                }
                None => {}
            }
        }
        info!("Replaying {} posts from {}", events.len(), self.path.display());

        let (tx, rx) = mpsc::channel(events.len().max(1));
        let pace = self.pace;
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("44196397\tDoge!"), Some(("44196397", "Doge!")));
        assert_eq!(parse_line("1\ttabs\tinside"), Some(("1", "tabs\tinside")));
        assert_eq!(parse_line("# comment"), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("no tab here"), None);
        assert_eq!(parse_line("\ttext without author"), None);
    }

    #[tokio::test]
    async fn test_replay_in_file_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# recorded").unwrap();
        writeln!(file, "1\tfirst doge").unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, "2\tsecond").unwrap();
        writeln!(file, "1\tthird").unwrap();

        let source = ReplaySource::new(file.path());
        let mut rx = source.subscribe().await.unwrap();

        let mut texts = Vec::new();
        while let Some(event) = rx.recv().await {
            texts.push(event.text);
        }
        assert_eq!(texts, vec!["first doge", "second", "third"]);
    }

    #[tokio::test]
    async fn test_replay_filters_authors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1\tkeep").unwrap();
        writeln!(file, "2\tdrop").unwrap();

        let source = ReplaySource::new(file.path()).with_followed(vec!["1".to_string()]);
        let mut rx = source.subscribe().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().text, "keep");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = ReplaySource::new("/nonexistent/replay.tsv");
        tokio_test::assert_err!(source.subscribe().await);
    }
}
