//! Run status and the progress events a run emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a run is in its lifecycle.
///
/// `fetching → grouping → grouping_complete → versioning → completed`, with
/// `stopped` and `error` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Fetching,
    Grouping,
    GroupingComplete,
    Versioning,
    Completed,
    Stopped,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Grouping => "grouping",
            Self::GroupingComplete => "grouping_complete",
            Self::Versioning => "versioning",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running totals for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub statutes: usize,
    pub partitions: usize,
    pub batches_total: usize,
    pub batches_done: usize,
    pub oracle_batches: usize,
    pub fallback_batches: usize,
    pub groups: usize,
    pub chains: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: String,
    pub status: RunStatus,
    pub percent_complete: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<RunCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        run_id: &str,
        status: RunStatus,
        percent_complete: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            status,
            percent_complete: percent_complete.min(100),
            message: message.into(),
            counts: None,
            error: None,
            at: Utc::now(),
        }
    }

    pub fn with_counts(mut self, counts: &RunCounts) -> Self {
        self.counts = Some(counts.clone());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
