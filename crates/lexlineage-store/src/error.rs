use std::path::PathBuf;

use lexlineage_core::tabular::TabularError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("parquet file not found: {0}")]
    ParquetNotFound(PathBuf),

    #[error("no results for query")]
    NoResults,

    #[error("statute source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("malformed statute record on line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("tabular layout: {0}")]
    Tabular(#[from] TabularError),

    #[error("{0}")]
    Other(String),
}
