//! Twitter v2 filtered stream source
//!
//! Installs a single `from:<id> OR ...` rule for the followed accounts, then
//! holds the streaming connection open and forwards each post as a
//! [`TextEvent`]. Posts by anyone else (replies, quote tweets matched through
//! the rule) are dropped here. The connection is re-established with
//! exponential backoff until the receiver is dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{NewRule, RulesRequest, RulesResponse, StreamPayload};
use crate::config::TwitterSection;
use crate::ports::{SourceError, TextEvent, TextEventSource};

const RULE_TAG: &str = "followed-users";

#[derive(Debug, Clone)]
pub struct TwitterStreamConfig {
    pub api_url: String,
    pub bearer_token: String,
    pub followed_user_ids: Vec<String>,
    pub channel_capacity: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl TwitterStreamConfig {
    pub fn from_section(
        section: &TwitterSection,
        followed_user_ids: Vec<String>,
    ) -> Result<Self, SourceError> {
        let bearer_token = section
            .get_bearer_token()
            .ok_or_else(|| SourceError::ConnectionError("no Twitter bearer token".into()))?;
        Ok(Self {
            api_url: section.api_url.trim_end_matches('/').to_string(),
            bearer_token,
            followed_user_ids,
            channel_capacity: 256,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(64),
        })
    }
}

pub struct TwitterStream {
    config: TwitterStreamConfig,
    followed: Arc<HashSet<String>>,
    http: Client,
}

impl TwitterStream {
    pub fn new(config: TwitterStreamConfig) -> Result<Self, SourceError> {
        if config.followed_user_ids.is_empty() {
            return Err(SourceError::RuleError("no followed users".into()));
        }
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SourceError::ConnectionError(e.to_string()))?;
        let followed = Arc::new(config.followed_user_ids.iter().cloned().collect());
        Ok(Self {
            config,
            followed,
            http,
        })
    }

    /// Replace any existing stream rules with the followed-users rule
    pub async fn sync_rules(&self) -> Result<(), SourceError> {
        let url = format!("{}/tweets/search/stream/rules", self.config.api_url);
        let rule_value = build_rule(&self.config.followed_user_ids);

        let existing: RulesResponse = self
            .http
            .get(&url)
            .bearer_auth(&self.config.bearer_token)
            .send()
            .await
            .map_err(|e| SourceError::RuleError(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError::RuleError(e.to_string()))?
            .json()
            .await
            .map_err(|e| SourceError::RuleError(e.to_string()))?;

        if existing.data.len() == 1 && existing.data[0].value == rule_value {
            debug!("Stream rule already installed");
            return Ok(());
        }

        if !existing.data.is_empty() {
            let ids = existing.data.into_iter().map(|r| r.id).collect();
            self.post_rules(&url, &RulesRequest::Delete { ids }).await?;
        }

        self.post_rules(
            &url,
            &RulesRequest::Add(vec![NewRule {
                value: rule_value.clone(),
                tag: RULE_TAG.to_string(),
            }]),
        )
        .await?;
        info!("Installed stream rule: {}", rule_value);
        Ok(())
    }

    async fn post_rules(&self, url: &str, body: &RulesRequest) -> Result<(), SourceError> {
        self.http
            .post(url)
            .bearer_auth(&self.config.bearer_token)
            .json(body)
            .send()
            .await
            .map_err(|e| SourceError::RuleError(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError::RuleError(e.to_string()))?;
        Ok(())
    }

    /// Read one connection until it ends. Returns false once the receiver is gone.
    async fn pump(
        http: &Client,
        config: &TwitterStreamConfig,
        followed: &HashSet<String>,
        tx: &mpsc::Sender<TextEvent>,
    ) -> Result<bool, SourceError> {
        let url = format!(
            "{}/tweets/search/stream?tweet.fields=author_id&expansions=author_id",
            config.api_url
        );
        let mut response = http
            .get(&url)
            .bearer_auth(&config.bearer_token)
            .send()
            .await
            .map_err(|e| SourceError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::ConnectionError("rate limited".into()));
        }
        if !status.is_success() {
            return Err(SourceError::ConnectionError(format!("status {}", status)));
        }
        info!("Connected to filtered stream");

        let mut lines = LineBuffer::default();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SourceError::ConnectionError(e.to_string()))?
        {
            for line in lines.push(&chunk) {
                if let Some(event) = parse_tweet_line(&line, followed) {
                    if tx.send(event).await.is_err() {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl TextEventSource for TwitterStream {
    async fn subscribe(&self) -> Result<mpsc::Receiver<TextEvent>, SourceError> {
        self.sync_rules().await?;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let http = self.http.clone();
        let config = self.config.clone();
        let followed = Arc::clone(&self.followed);

        tokio::spawn(async move {
            let mut backoff = config.initial_backoff;
            loop {
                match Self::pump(&http, &config, &followed, &tx).await {
                    Ok(false) => break,
                    Ok(true) => {
                        warn!("Filtered stream closed by server, reconnecting");
                        backoff = config.initial_backoff;
                    }
                    Err(e) => warn!("Filtered stream error: {}, retrying in {:?}", e, backoff),
                }
                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
            }
            debug!("Filtered stream task finished");
        });

        Ok(rx)
    }
}

/// `from:1 OR from:2`
pub fn build_rule(user_ids: &[String]) -> String {
    user_ids
        .iter()
        .map(|id| format!("from:{}", id))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Turn one stream line into an event if it is a post by a followed account
pub fn parse_tweet_line(line: &str, followed: &HashSet<String>) -> Option<TextEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None; // keep-alive
    }
    let payload: StreamPayload = match serde_json::from_str(line) {
        Ok(p) => p,
        Err(e) => {
            warn!("Unparseable stream line: {}", e);
            return None;
        }
    };
    for err in &payload.errors {
        warn!("Stream error: {} {}", err.title, err.detail);
    }
    let tweet = payload.data?;
    let author = tweet.author_id?;
    if !followed.contains(&author) {
        debug!("Dropping tweet {} by non-followed author {}", tweet.id, author);
        return None;
    }
    Some(TextEvent::new(author, tweet.text))
}

/// Reassembles newline-delimited records split across HTTP chunks
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let line = std::mem::replace(&mut self.pending, rest);
            lines.push(String::from_utf8_lossy(&line).trim_end().to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn followed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_rule() {
        let ids = vec!["44196397".to_string(), "1".to_string()];
        assert_eq!(build_rule(&ids), "from:44196397 OR from:1");
    }

    #[test]
    fn test_parse_followed_author() {
        let line = r#"{"data":{"id":"9","text":"doge to the moon","author_id":"44196397"},"matching_rules":[{"id":"1","tag":"followed-users"}]}"#;
        let event = parse_tweet_line(line, &followed(&["44196397"])).unwrap();
        assert_eq!(event.author_id, "44196397");
        assert_eq!(event.text, "doge to the moon");
    }

    #[test]
    fn test_parse_drops_other_authors() {
        let line = r#"{"data":{"id":"9","text":"@elonmusk doge","author_id":"555"}}"#;
        assert!(parse_tweet_line(line, &followed(&["44196397"])).is_none());
    }

    #[test]
    fn test_parse_keepalive_and_garbage() {
        let f = followed(&["1"]);
        assert!(parse_tweet_line("\r", &f).is_none());
        assert!(parse_tweet_line("{not json", &f).is_none());
        assert!(parse_tweet_line(r#"{"errors":[{"title":"ConnectionException"}]}"#, &f).is_none());
    }

    #[test]
    fn test_line_buffer_reassembles_split_records() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"{\"a\":").is_empty());
        let lines = buf.push(b"1}\r\n\r\n{\"b\"");
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), String::new()]);
        let lines = buf.push(b":2}\r\n");
        assert_eq!(lines, vec!["{\"b\":2}".to_string()]);
    }

    #[test]
    fn test_new_requires_followed_users() {
        let config = TwitterStreamConfig {
            api_url: "https://api.twitter.com/2".into(),
            bearer_token: "t".into(),
            followed_user_ids: vec![],
            channel_capacity: 8,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        };
        assert!(matches!(
            TwitterStream::new(config),
            Err(SourceError::RuleError(_))
        ));
    }
}
