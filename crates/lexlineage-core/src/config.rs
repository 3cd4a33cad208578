//! Run configuration.
//!
//! Every field has a default, so an empty TOML file (or no file at all) is a
//! valid configuration. CLI flags are applied on top by the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for one grouping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum statutes per oracle batch.
    pub batch_size: usize,
    /// Concurrent batches within one province partition.
    pub parallelism: usize,
    /// Whether to ask the oracle at all. When false every batch uses the
    /// base-name fallback.
    pub use_oracle: bool,
    /// Oracle merges below this confidence are split by base name unless all
    /// members already share one.
    pub min_merge_confidence: f32,
    /// Run the amendment chain detector after versioning.
    pub detect_chains: bool,
    /// Page size used when draining the statute source.
    pub page_size: usize,
    pub snippet: SnippetConfig,
    pub oracle: OracleConfig,
    pub scope: ScopeConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            parallelism: 1,
            use_oracle: true,
            min_merge_confidence: 0.6,
            detect_chains: true,
            page_size: 500,
            snippet: SnippetConfig::default(),
            oracle: OracleConfig::default(),
            scope: ScopeConfig::default(),
        }
    }
}

/// Context-length limits for snippets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    pub max_chars: usize,
    pub max_sections: usize,
    pub section_chars: usize,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            max_chars: 5000,
            max_sections: 5,
            section_chars: 300,
        }
    }
}

/// Oracle endpoint and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 2048,
            timeout_secs: 30,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

/// Optional restriction of the input set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Jurisdiction labels to include (matched after province resolution).
    pub jurisdictions: Vec<String>,
    /// Explicit statute ids to include.
    pub statute_ids: Vec<String>,
}

impl ScopeConfig {
    pub fn is_empty(&self) -> bool {
        self.jurisdictions.is_empty() && self.statute_ids.is_empty()
    }
}

impl RunConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be >= 1".into()));
        }
        if self.parallelism == 0 {
            return Err(ConfigError::Invalid("parallelism must be >= 1".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be >= 1".into()));
        }
        if self.snippet.max_chars == 0 || self.snippet.section_chars == 0 {
            return Err(ConfigError::Invalid(
                "snippet.max_chars and snippet.section_chars must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_merge_confidence) {
            return Err(ConfigError::Invalid(
                "min_merge_confidence must be in [0.0, 1.0]".into(),
            ));
        }
        if self.oracle.max_attempts == 0 {
            return Err(ConfigError::Invalid("oracle.max_attempts must be >= 1".into()));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::Invalid("oracle.timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}
