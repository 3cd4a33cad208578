//! Grouping runs: fetch, partition, batch through the oracle (or fallback),
//! version, detect chains, and write the result set, reporting progress
//! along the way.

mod error;
mod progress;
mod run;

pub use error::EngineError;
pub use progress::{ProgressEvent, RunCounts, RunStatus};
pub use run::{RunHandle, RunSummary, start_run, start_run_with_cancel};
