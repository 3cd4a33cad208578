//! Semantic grouping oracle: an AI-backed partitioner of statute batches with
//! strict response validation, bounded retries, and a deterministic fallback.

mod batch;
mod error;
mod oracle;
pub mod prompt;
pub mod response;
pub mod retry;

pub use batch::{BatchGrouper, BatchGrouping, BatchOutcome};
pub use error::OracleError;
pub use oracle::{ClaudeOracle, GroupingOracle};
pub use response::{PartitionOutcome, parse_partition};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
