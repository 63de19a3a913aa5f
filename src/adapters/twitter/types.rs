//! Twitter API v2 payloads (filtered stream)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct StreamPayload {
    pub data: Option<TweetData>,
    #[serde(default)]
    pub errors: Vec<StreamError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamError {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

/// GET /tweets/search/stream/rules
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesResponse {
    #[serde(default)]
    pub data: Vec<StreamRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRule {
    pub id: String,
    pub value: String,
    pub tag: Option<String>,
}

/// POST /tweets/search/stream/rules
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RulesRequest {
    Add(Vec<NewRule>),
    Delete { ids: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRule {
    pub value: String,
    pub tag: String,
}
