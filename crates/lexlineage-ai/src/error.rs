use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle not configured: {0}")]
    NotConfigured(String),
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("oracle returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid partition: {0}")]
    Invalid(String),
}

impl OracleError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotConfigured(_))
    }
}
