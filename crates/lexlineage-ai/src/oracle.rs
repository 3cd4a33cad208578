//! Oracle trait and the Claude Messages API client.

use async_trait::async_trait;
use lexlineage_core::OracleConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OracleError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// An external service that proposes a partition for one batch.
///
/// Implementations return the raw response text; validation happens in
/// [`crate::parse_partition`].
#[async_trait]
pub trait GroupingOracle: Send + Sync {
    async fn propose(&self, system: &str, user: &str) -> Result<String, OracleError>;

    fn name(&self) -> &str;
}

/// Claude via the Anthropic Messages API.
pub struct ClaudeOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ClaudeOracle {
    /// Create a client for the given endpoint (no trailing slash needed).
    pub fn new(endpoint: &str, model: &str, api_key: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            max_tokens,
        }
    }

    /// Build from config, reading the key from the configured env var.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::NotConfigured(format!("{} not set", config.api_key_env)))?;
        Ok(Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            config.max_tokens,
        ))
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.endpoint)
    }
}

#[async_trait]
impl GroupingOracle for ClaudeOracle {
    async fn propose(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: [Message {
                role: "user",
                content: user,
            }],
        };

        debug!(model = %self.model, prompt_chars = user.len(), "calling oracle");
        let resp = self
            .client
            .post(self.url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = resp.json().await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        if text.trim().is_empty() {
            return Err(OracleError::Invalid("response had no text content".into()));
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
