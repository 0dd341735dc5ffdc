use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::InsightGenerator;
use crate::config::InsightConfig;
use crate::error::InsightError;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// [`InsightGenerator`] over the Anthropic Messages API.
///
/// Requests carry an enforced timeout and are never retried.
pub struct ClaudeGenerator {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl ClaudeGenerator {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, InsightError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http,
            base_url: ANTHROPIC_API_URL.to_string(),
        })
    }

    /// Builds a generator from config, reading the key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`InsightError::MissingCredential`] if the key variable is
    /// unset or empty.
    pub fn from_config(config: &InsightConfig) -> Result<Self, InsightError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| InsightError::MissingCredential(config.api_key_env.clone()))?;
        Self::new(&api_key, &config.model, config.timeout())
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, InsightError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| InsightError::Transport(format!("invalid API key header: {e}")))?;
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl InsightGenerator for ClaudeGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, InsightError> {
        let url = format!("{}/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, max_tokens, "Claude messages request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.json::<MessagesResponse>().await?.text();
        if text.trim().is_empty() {
            return Err(InsightError::EmptyResponse);
        }
        Ok(text)
    }
}
