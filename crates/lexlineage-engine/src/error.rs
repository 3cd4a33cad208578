use lexlineage_core::{ConfigError, InvariantViolation};
use lexlineage_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("statute source failed: {0}")]
    Source(#[source] StoreError),
    #[error("result store failed: {0}")]
    Store(#[source] StoreError),
    #[error("group invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
    #[error("run task failed: {0}")]
    Join(String),
}
