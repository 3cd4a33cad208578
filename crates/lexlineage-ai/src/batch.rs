//! Oracle-with-fallback for a single batch.

use std::sync::Arc;
use std::time::Duration;

use lexlineage_core::grouping::apply_confidence_floor;
use lexlineage_core::{BatchItem, CancelFlag, GroupingMethod, ProposedGroup, RunConfig};
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::oracle::GroupingOracle;
use crate::prompt::{SYSTEM_PROMPT, build_user_prompt};
use crate::response::{PartitionOutcome, parse_partition};
use crate::retry::{RetryDecision, RetryPolicy, RetryState};

/// The partition chosen for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGrouping {
    pub groups: Vec<ProposedGroup>,
    pub method: GroupingMethod,
    /// Oracle calls made, including failed ones.
    pub attempts: u32,
    /// Why the oracle result was not used, when it wasn't.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Grouped(BatchGrouping),
    /// Cancellation was observed; nothing from this batch may be committed.
    Cancelled,
}

/// Groups batches with the oracle when one is available, falling back to
/// base-name grouping when it is absent, keeps failing, or answers with an
/// invalid partition.
#[derive(Clone)]
pub struct BatchGrouper {
    oracle: Option<Arc<dyn GroupingOracle>>,
    policy: RetryPolicy,
    timeout: Duration,
    min_merge_confidence: f32,
}

impl BatchGrouper {
    pub fn new(
        oracle: Option<Arc<dyn GroupingOracle>>,
        policy: RetryPolicy,
        timeout: Duration,
        min_merge_confidence: f32,
    ) -> Self {
        Self {
            oracle,
            policy,
            timeout,
            min_merge_confidence,
        }
    }

    /// Grouper for a run. The oracle is only consulted when `use_oracle` is set.
    pub fn from_config(oracle: Option<Arc<dyn GroupingOracle>>, config: &RunConfig) -> Self {
        Self::new(
            oracle.filter(|_| config.use_oracle),
            RetryPolicy::from(&config.oracle),
            Duration::from_secs(config.oracle.timeout_secs),
            config.min_merge_confidence,
        )
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// Partition one batch. `batch` is only used for log context.
    pub async fn group(
        &self,
        batch: usize,
        items: &[BatchItem],
        cancel: &CancelFlag,
    ) -> BatchOutcome {
        if cancel.is_cancelled() {
            return BatchOutcome::Cancelled;
        }
        let Some(oracle) = self.oracle.as_deref() else {
            return BatchOutcome::Grouped(fallback(items, 0, None));
        };

        let jurisdiction = items
            .first()
            .map(|i| i.jurisdiction.as_str())
            .unwrap_or("unknown");
        let user = build_user_prompt(items);
        let mut retry = RetryState::new(self.policy.clone());
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return BatchOutcome::Cancelled;
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return BatchOutcome::Cancelled,
                r = tokio::time::timeout(self.timeout, oracle.propose(SYSTEM_PROMPT, &user)) => r,
            };
            // A response that lands after the signal is discarded.
            if cancel.is_cancelled() {
                return BatchOutcome::Cancelled;
            }

            let error = match result {
                Err(_) => OracleError::Timeout(self.timeout),
                Ok(Err(e)) => e,
                Ok(Ok(raw)) => match parse_partition(&raw, items.len()) {
                    PartitionOutcome::Partition(groups) => {
                        debug!(
                            batch,
                            jurisdiction,
                            attempt,
                            groups = groups.len(),
                            "oracle partition accepted"
                        );
                        let groups =
                            apply_confidence_floor(groups, items, self.min_merge_confidence);
                        return BatchOutcome::Grouped(BatchGrouping {
                            groups,
                            method: GroupingMethod::Oracle,
                            attempts: attempt,
                            fallback_reason: None,
                        });
                    }
                    PartitionOutcome::Invalid(reason) => OracleError::Invalid(reason),
                },
            };

            warn!(
                batch,
                jurisdiction,
                attempt,
                oracle = oracle.name(),
                first_statute_id = items.first().map(|i| i.statute_id.as_str()).unwrap_or(""),
                error = %error,
                "oracle attempt failed"
            );

            let decision = if error.is_retryable() {
                retry.on_failure()
            } else {
                RetryDecision::GiveUp
            };
            match decision {
                RetryDecision::RetryAfter(delay) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return BatchOutcome::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp => {
                    warn!(
                        batch,
                        jurisdiction,
                        attempts = attempt,
                        "oracle gave up, using base-name fallback"
                    );
                    return BatchOutcome::Grouped(fallback(items, attempt, Some(error.to_string())));
                }
            }
        }
    }
}

fn fallback(items: &[BatchItem], attempts: u32, reason: Option<String>) -> BatchGrouping {
    BatchGrouping {
        groups: lexlineage_core::fallback_groups(items),
        method: GroupingMethod::Fallback,
        attempts,
        fallback_reason: reason,
    }
}
