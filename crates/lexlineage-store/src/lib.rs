//! Storage layer: statute sources, the run result store, exports (JSON,
//! Parquet, CSV), and optional DuckDB analytics over exported Parquet.

mod error;
pub mod export;
pub mod results;
pub mod source;

pub use error::StoreError;
pub use export::ResultExport;
pub use results::{GroupQuery, MemoryResultStore, Page, ResultStore};
pub use source::{JsonFileSource, MemorySource, StatuteSource, load_all};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
