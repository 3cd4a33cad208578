//! Spawning and driving one grouping run.
//!
//! A run is a single tokio task. It reports through an ordered event channel
//! and a watch of the latest event, and ends with exactly one terminal event
//! (`completed`, `stopped` or `error`).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::StreamExt;
use lexlineage_ai::{BatchGrouper, BatchOutcome, GroupingOracle};
use lexlineage_core::{
    AmendmentChain, BatchItem, CancelFlag, ChainInput, ContextSnippet, GroupCandidate,
    GroupingMethod, Province, RunConfig, Statute, StatuteGroup, VersionInput, assign_versions,
    build_snippet, detect_chains, partition_by_province,
};
use lexlineage_store::{ResultStore, StatuteSource, load_all};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::progress::{ProgressEvent, RunCounts, RunStatus};

const FETCHED_PERCENT: u8 = 10;
const GROUPED_PERCENT: u8 = 70;
const VERSIONED_PERCENT: u8 = 95;

/// Final outcome of a run, returned by [`RunHandle::wait`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub counts: RunCounts,
    pub error: Option<String>,
}

/// Caller's side of a running grouping run.
pub struct RunHandle {
    pub run_id: String,
    /// Every progress event, in emission order. Closes when the run ends.
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    /// The most recent progress event.
    pub status: watch::Receiver<ProgressEvent>,
    cancel: CancelFlag,
    task: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Ask the run to stop. Batches already committed are still written.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    pub fn latest(&self) -> ProgressEvent {
        self.status.borrow().clone()
    }

    /// Wait for the run task to finish.
    pub async fn wait(self) -> Result<RunSummary, EngineError> {
        self.task.await.map_err(|e| EngineError::Join(e.to_string()))
    }
}

/// Start a grouping run on the current tokio runtime.
///
/// `oracle` may be `None`; every batch then uses base-name grouping.
pub fn start_run(
    source: Arc<dyn StatuteSource>,
    store: Arc<dyn ResultStore>,
    oracle: Option<Arc<dyn GroupingOracle>>,
    config: RunConfig,
) -> RunHandle {
    start_run_with_cancel(source, store, oracle, config, CancelFlag::new())
}

/// Like [`start_run`], observing an externally owned cancel flag.
pub fn start_run_with_cancel(
    source: Arc<dyn StatuteSource>,
    store: Arc<dyn ResultStore>,
    oracle: Option<Arc<dyn GroupingOracle>>,
    config: RunConfig,
    cancel: CancelFlag,
) -> RunHandle {
    let run_id = uuid::Uuid::new_v4().to_string();
    let (events_tx, events) = mpsc::unbounded_channel();
    let (status_tx, status) = watch::channel(ProgressEvent::new(
        &run_id,
        RunStatus::Fetching,
        0,
        "run starting",
    ));

    let run = Run {
        run_id: run_id.clone(),
        source,
        store,
        oracle,
        config,
        cancel: cancel.clone(),
        events: events_tx,
        status: status_tx,
        counts: RunCounts::default(),
        percent: 0,
    };
    let task = tokio::spawn(run.execute());

    RunHandle {
        run_id,
        events,
        status,
        cancel,
        task,
    }
}

struct Run {
    run_id: String,
    source: Arc<dyn StatuteSource>,
    store: Arc<dyn ResultStore>,
    oracle: Option<Arc<dyn GroupingOracle>>,
    config: RunConfig,
    cancel: CancelFlag,
    events: mpsc::UnboundedSender<ProgressEvent>,
    status: watch::Sender<ProgressEvent>,
    counts: RunCounts,
    percent: u8,
}

impl Run {
    async fn execute(mut self) -> RunSummary {
        info!(run_id = %self.run_id, source = %self.source.describe(), "run started");
        match self.drive().await {
            Ok(status) => self.finish(status, None),
            Err(e) => {
                error!(run_id = %self.run_id, error = %e, "run failed");
                self.finish(RunStatus::Error, Some(e.to_string()))
            }
        }
    }

    /// Everything up to, but not including, the terminal event.
    async fn drive(&mut self) -> Result<RunStatus, EngineError> {
        self.config.validate()?;

        self.emit(
            RunStatus::Fetching,
            0,
            format!("loading statutes from {}", self.source.describe()),
        );
        let statutes = load_all(
            self.source.as_ref(),
            self.config.page_size,
            &self.config.scope,
        )
        .await
        .map_err(EngineError::Source)?;

        let partitions = partition_by_province(&statutes);
        let batch_size = self.config.batch_size.max(1);
        self.counts.statutes = statutes.len();
        self.counts.partitions = partitions.len();
        self.counts.batches_total = partitions
            .values()
            .map(|ids| ids.len().div_ceil(batch_size))
            .sum();
        self.emit(
            RunStatus::Fetching,
            FETCHED_PERCENT,
            format!(
                "loaded {} statutes in {} partitions",
                self.counts.statutes, self.counts.partitions
            ),
        );
        if self.cancel.is_cancelled() {
            return Ok(RunStatus::Stopped);
        }

        let by_id: HashMap<&str, &Statute> = statutes.iter().map(|s| (s.id.as_str(), s)).collect();
        let snippets: HashMap<&str, ContextSnippet> = statutes
            .iter()
            .map(|s| (s.id.as_str(), build_snippet(s, &self.config.snippet)))
            .collect();

        let mut candidates = self.group_partitions(&partitions, &by_id, &snippets).await;
        candidates.sort_by_key(|c| c.batch);
        let stopped = self.cancel.is_cancelled();

        if stopped {
            if self.counts.batches_done == 0 {
                info!(run_id = %self.run_id, "run stopped before any batch was committed");
                return Ok(RunStatus::Stopped);
            }
        } else {
            self.emit(
                RunStatus::GroupingComplete,
                GROUPED_PERCENT,
                format!(
                    "{} candidate groups from {} batches",
                    candidates.len(),
                    self.counts.batches_done
                ),
            );
            self.emit(RunStatus::Versioning, GROUPED_PERCENT, "assigning versions");
        }

        let groups = self.version(&candidates, &by_id, &snippets)?;
        self.counts.groups = groups.len();

        let chains = if self.config.detect_chains && !stopped {
            self.chains(&partitions, &by_id, &snippets)
        } else {
            Vec::new()
        };
        self.counts.chains = chains.len();
        if !stopped {
            self.emit(
                RunStatus::Versioning,
                VERSIONED_PERCENT,
                format!(
                    "versioned {} groups, found {} amendment chains",
                    self.counts.groups, self.counts.chains
                ),
            );
        }

        self.store
            .replace_run(&self.run_id, groups, chains)
            .await
            .map_err(EngineError::Store)?;
        info!(
            run_id = %self.run_id,
            groups = self.counts.groups,
            chains = self.counts.chains,
            "result set written"
        );

        Ok(if stopped {
            RunStatus::Stopped
        } else {
            RunStatus::Completed
        })
    }

    /// Run every partition's batches. Partitions go one after another;
    /// batches inside a partition run up to `parallelism` at a time.
    async fn group_partitions(
        &mut self,
        partitions: &BTreeMap<Province, Vec<String>>,
        by_id: &HashMap<&str, &Statute>,
        snippets: &HashMap<&str, ContextSnippet>,
    ) -> Vec<GroupCandidate> {
        let grouper = BatchGrouper::from_config(self.oracle.clone(), &self.config);
        if self.config.use_oracle && self.oracle.is_none() {
            warn!(
                run_id = %self.run_id,
                "oracle requested but not configured, every batch uses base-name grouping"
            );
        }
        let cancel = self.cancel.clone();
        let batch_size = self.config.batch_size.max(1);
        let parallelism = self.config.parallelism.max(1);
        let total = self.counts.batches_total.max(1);

        self.emit(
            RunStatus::Grouping,
            FETCHED_PERCENT,
            format!(
                "grouping {} batches (oracle: {})",
                self.counts.batches_total,
                if grouper.has_oracle() { "on" } else { "off" }
            ),
        );

        let mut candidates = Vec::new();
        let mut next_batch = 0usize;
        for (&province, ids) in partitions {
            if cancel.is_cancelled() {
                break;
            }
            info!(
                run_id = %self.run_id,
                jurisdiction = province.as_str(),
                statutes = ids.len(),
                "grouping partition"
            );

            let batches: Vec<(usize, Vec<BatchItem>)> = ids
                .chunks(batch_size)
                .map(|chunk| {
                    let index = next_batch;
                    next_batch += 1;
                    let items = chunk
                        .iter()
                        .filter_map(|id| {
                            let statute = by_id.get(id.as_str()).copied()?;
                            Some(BatchItem::new(statute, snippets.get(id.as_str())?))
                        })
                        .collect();
                    (index, items)
                })
                .collect();

            let grouper = &grouper;
            let cancel = &cancel;
            let mut results = futures::stream::iter(batches)
                .map(|(index, items)| async move {
                    let outcome = grouper.group(index, &items, cancel).await;
                    (index, items, outcome)
                })
                .buffer_unordered(parallelism);

            while let Some((index, items, outcome)) = results.next().await {
                let grouping = match outcome {
                    BatchOutcome::Grouped(grouping) => grouping,
                    BatchOutcome::Cancelled => {
                        debug!(batch = index, "batch discarded after cancellation");
                        continue;
                    }
                };

                let method = grouping.method;
                self.counts.batches_done += 1;
                match method {
                    GroupingMethod::Oracle => self.counts.oracle_batches += 1,
                    GroupingMethod::Fallback => self.counts.fallback_batches += 1,
                }
                candidates.extend(grouping.groups.into_iter().map(|group| GroupCandidate {
                    jurisdiction: province,
                    statute_ids: group
                        .members
                        .iter()
                        .map(|&i| items[i].statute_id.clone())
                        .collect(),
                    method,
                    confidence: group.confidence,
                    batch: index,
                }));

                let done = self.counts.batches_done;
                let span = usize::from(GROUPED_PERCENT - FETCHED_PERCENT);
                let percent = FETCHED_PERCENT + u8::try_from(span * done / total).unwrap_or(0);
                self.emit(
                    RunStatus::Grouping,
                    percent,
                    format!(
                        "batch {done}/{} ({}) grouped by {}",
                        self.counts.batches_total,
                        province,
                        method.as_str()
                    ),
                );
            }
        }
        candidates
    }

    fn version(
        &self,
        candidates: &[GroupCandidate],
        by_id: &HashMap<&str, &Statute>,
        snippets: &HashMap<&str, ContextSnippet>,
    ) -> Result<Vec<StatuteGroup>, EngineError> {
        candidates
            .iter()
            .map(|candidate| {
                let inputs: Vec<VersionInput<'_>> = candidate
                    .statute_ids
                    .iter()
                    .filter_map(|id| {
                        Some(VersionInput {
                            statute: by_id.get(id.as_str()).copied()?,
                            snippet: snippets.get(id.as_str())?.text.as_str(),
                        })
                    })
                    .collect();
                let members = assign_versions(&inputs, candidate.confidence);
                Ok(StatuteGroup::assemble(
                    &self.run_id,
                    candidate.jurisdiction,
                    candidate.method,
                    members,
                )?)
            })
            .collect()
    }

    fn chains(
        &self,
        partitions: &BTreeMap<Province, Vec<String>>,
        by_id: &HashMap<&str, &Statute>,
        snippets: &HashMap<&str, ContextSnippet>,
    ) -> Vec<AmendmentChain> {
        partitions
            .iter()
            .flat_map(|(&province, ids)| {
                let inputs: Vec<ChainInput<'_>> = ids
                    .iter()
                    .filter_map(|id| {
                        Some(ChainInput {
                            statute: by_id.get(id.as_str()).copied()?,
                            snippet: snippets.get(id.as_str())?.text.as_str(),
                        })
                    })
                    .collect();
                detect_chains(&self.run_id, province, &inputs)
            })
            .collect()
    }

    fn emit(&mut self, status: RunStatus, percent: u8, message: impl Into<String>) {
        let event = ProgressEvent::new(&self.run_id, status, percent.max(self.percent), message)
            .with_counts(&self.counts);
        self.publish(event);
    }

    fn publish(&mut self, event: ProgressEvent) {
        self.percent = event.percent_complete;
        self.status.send_replace(event.clone());
        // The caller may have dropped the receiver; the run still finishes.
        let _ = self.events.send(event);
    }

    fn finish(&mut self, status: RunStatus, error: Option<String>) -> RunSummary {
        let message = match status {
            RunStatus::Completed => format!(
                "{} groups, {} amendment chains",
                self.counts.groups, self.counts.chains
            ),
            RunStatus::Stopped => format!(
                "stopped after {} of {} batches, {} groups kept",
                self.counts.batches_done, self.counts.batches_total, self.counts.groups
            ),
            _ => "run failed".to_string(),
        };
        let percent = if status == RunStatus::Completed {
            100
        } else {
            self.percent
        };
        let mut event =
            ProgressEvent::new(&self.run_id, status, percent, message).with_counts(&self.counts);
        if let Some(e) = &error {
            event = event.with_error(e.clone());
        }
        self.publish(event);
        info!(run_id = %self.run_id, status = %status, "run finished");

        RunSummary {
            run_id: self.run_id.clone(),
            status,
            counts: self.counts.clone(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use lexlineage_ai::OracleError;
    use lexlineage_store::{GroupQuery, MemoryResultStore, MemorySource, Page, StoreError};

    use super::*;

    fn config(use_oracle: bool) -> RunConfig {
        let mut config = RunConfig {
            use_oracle,
            ..RunConfig::default()
        };
        config.oracle.base_delay_ms = 1;
        config.oracle.max_delay_ms = 2;
        config
    }

    fn federal(id: &str, title: &str) -> Statute {
        Statute::titled(id, title).with_jurisdiction("Federal")
    }

    async fn drain(mut handle: RunHandle) -> (Vec<ProgressEvent>, RunSummary) {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        let summary = handle.wait().await.unwrap();
        (events, summary)
    }

    fn assert_single_terminal(events: &[ProgressEvent], status: RunStatus) {
        let terminal: Vec<_> = events.iter().filter(|e| e.status.is_terminal()).collect();
        assert_eq!(terminal.len(), 1, "expected one terminal event: {events:#?}");
        assert_eq!(terminal[0].status, status);
        assert_eq!(events.last().map(|e| e.status), Some(status));
        assert!(
            events
                .windows(2)
                .all(|w| w[0].percent_complete <= w[1].percent_complete),
            "percent went backwards"
        );
    }

    async fn all_groups(store: &MemoryResultStore) -> Page<StatuteGroup> {
        store.query_groups(&GroupQuery::default()).await.unwrap()
    }

    /// Oracle that always fails as if the call had timed out.
    struct TimingOut {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GroupingOracle for TimingOut {
        async fn propose(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OracleError::Timeout(Duration::from_millis(1)))
        }

        fn name(&self) -> &str {
            "timing-out"
        }
    }

    /// Oracle that pairs items 0 and 1 and raises the cancel flag during
    /// call number `cancel_on`.
    struct Pairing {
        calls: AtomicUsize,
        cancel_on: usize,
        flag: CancelFlag,
    }

    #[async_trait]
    impl GroupingOracle for Pairing {
        async fn propose(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.cancel_on {
                self.flag.cancel();
            }
            Ok(r#"{"groups":[{"members":[0,1],"confidence":0.9}]}"#.to_string())
        }

        fn name(&self) -> &str {
            "pairing"
        }
    }

    struct FailingSource;

    #[async_trait]
    impl StatuteSource for FailingSource {
        async fn fetch_page(
            &self,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<Statute>, StoreError> {
            Err(StoreError::SourceUnavailable("connection refused".into()))
        }

        fn describe(&self) -> String {
            "failing".into()
        }
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl ResultStore for ReadOnlyStore {
        async fn replace_run(
            &self,
            _run_id: &str,
            _groups: Vec<StatuteGroup>,
            _chains: Vec<AmendmentChain>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Other("store is read-only".into()))
        }

        async fn query_groups(
            &self,
            _query: &GroupQuery,
        ) -> Result<Page<StatuteGroup>, StoreError> {
            unreachable!()
        }

        async fn get_group(&self, _id: &str) -> Result<Option<StatuteGroup>, StoreError> {
            unreachable!()
        }

        async fn group_for_statute(
            &self,
            _statute_id: &str,
        ) -> Result<Option<StatuteGroup>, StoreError> {
            unreachable!()
        }

        async fn query_chains(
            &self,
            _query: &GroupQuery,
        ) -> Result<Page<AmendmentChain>, StoreError> {
            unreachable!()
        }

        async fn current_run(&self) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn fallback_run_groups_by_base_name() {
        let source = Arc::new(MemorySource::new(vec![
            federal("c1", "Companies Act 1984"),
            federal("c2", "Companies Act (Amendment) 2017"),
            federal("crpc", "Criminal Procedure Code 1898"),
        ]));
        let store = Arc::new(MemoryResultStore::new());
        let handle = start_run(source, store.clone(), None, config(false));
        let run_id = handle.run_id.clone();
        let (events, summary) = drain(handle).await;

        assert_single_terminal(&events, RunStatus::Completed);
        assert_eq!(events.last().unwrap().percent_complete, 100);
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.counts.groups, 2);
        assert_eq!(summary.counts.fallback_batches, 1);

        let groups = all_groups(&store).await;
        assert_eq!(groups.total, 2);
        let companies = store.group_for_statute("c2").await.unwrap().unwrap();
        assert_eq!(companies.member_count, 2);
        assert_eq!(companies.original_id, "c1");
        assert_eq!(companies.method, GroupingMethod::Fallback);
        assert_eq!(companies.run_id, run_id);
        let crpc = store.group_for_statute("crpc").await.unwrap().unwrap();
        assert_eq!(crpc.member_count, 1);
        assert_eq!(store.current_run().await.unwrap(), Some(run_id));
    }

    #[tokio::test]
    async fn phases_are_reported_in_order() {
        let source = Arc::new(MemorySource::new(vec![federal("a", "Police Order 2002")]));
        let store = Arc::new(MemoryResultStore::new());
        let (events, _) = drain(start_run(source, store, None, config(false))).await;

        let mut phases: Vec<RunStatus> = events.iter().map(|e| e.status).collect();
        phases.dedup();
        assert_eq!(
            phases,
            vec![
                RunStatus::Fetching,
                RunStatus::Grouping,
                RunStatus::GroupingComplete,
                RunStatus::Versioning,
                RunStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn same_title_in_two_provinces_stays_apart() {
        let source = Arc::new(MemorySource::new(vec![
            Statute::titled("p", "Police Order 2002").with_jurisdiction("Punjab"),
            Statute::titled("s", "Police Order 2002").with_jurisdiction("Sindh"),
        ]));
        let store = Arc::new(MemoryResultStore::new());
        let (events, summary) = drain(start_run(source, store.clone(), None, config(false))).await;

        assert_single_terminal(&events, RunStatus::Completed);
        assert_eq!(summary.counts.partitions, 2);
        let punjab = store.group_for_statute("p").await.unwrap().unwrap();
        let sindh = store.group_for_statute("s").await.unwrap().unwrap();
        assert_ne!(punjab.id, sindh.id);
        assert_eq!(punjab.jurisdiction, Province::Punjab);
        assert_eq!(sindh.jurisdiction, Province::Sindh);
        assert_eq!(punjab.member_count, 1);
        assert_eq!(sindh.member_count, 1);
    }

    #[tokio::test]
    async fn missing_jurisdiction_goes_to_unknown_bucket() {
        let source = Arc::new(MemorySource::new(vec![
            Statute::titled("x", "Companies Act 1984"),
            federal("f", "Companies Act 1984"),
        ]));
        let store = Arc::new(MemoryResultStore::new());
        let (events, _) = drain(start_run(source, store.clone(), None, config(false))).await;

        assert_single_terminal(&events, RunStatus::Completed);
        let unknown = store.group_for_statute("x").await.unwrap().unwrap();
        assert_eq!(unknown.jurisdiction, Province::Unknown);
        assert_eq!(unknown.member_count, 1);
    }

    #[tokio::test]
    async fn oracle_timeouts_fall_back_and_complete() {
        let source = Arc::new(MemorySource::new(vec![
            federal("c1", "Companies Act 1984"),
            federal("p1", "Police Order 2002"),
            federal("c2", "Companies Act (Amendment) 2017"),
            federal("p2", "Police Order 2002 v2"),
            federal("c3", "Companies Act 1984"),
        ]));
        let store = Arc::new(MemoryResultStore::new());
        let oracle = Arc::new(TimingOut {
            calls: AtomicUsize::new(0),
        });
        let dyn_oracle: Arc<dyn GroupingOracle> = oracle.clone();
        let (events, summary) =
            drain(start_run(source, store.clone(), Some(dyn_oracle), config(true))).await;

        assert_single_terminal(&events, RunStatus::Completed);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
        assert_eq!(summary.counts.fallback_batches, 1);
        assert_eq!(summary.counts.oracle_batches, 0);

        let groups = all_groups(&store).await;
        assert_eq!(groups.total, 2);
        let companies = store.group_for_statute("c3").await.unwrap().unwrap();
        let ids: Vec<&str> = companies.members.iter().map(|m| m.statute.id.as_str()).collect();
        assert_eq!(companies.member_count, 3);
        assert!(ids.contains(&"c1") && ids.contains(&"c2"));
        assert!(groups.items.iter().all(|g| g.method == GroupingMethod::Fallback));
    }

    #[tokio::test]
    async fn oracle_requested_but_absent_uses_fallback() {
        let source = Arc::new(MemorySource::new(vec![
            federal("a", "Police Order 2002"),
            federal("b", "Police Order 2002 v2"),
            federal("c", "Land Revenue Act 1967"),
        ]));
        let store = Arc::new(MemoryResultStore::new());
        let config = RunConfig {
            batch_size: 2,
            ..config(true)
        };
        let (events, summary) = drain(start_run(source, store.clone(), None, config)).await;

        assert_single_terminal(&events, RunStatus::Completed);
        assert_eq!(summary.counts.batches_total, 2);
        assert_eq!(summary.counts.fallback_batches, 2);
        assert_eq!(all_groups(&store).await.total, 2);
    }

    #[tokio::test]
    async fn cancellation_keeps_committed_batches_only() {
        let titles = ["Alpha", "Bravo", "Charlie", "Delta", "Echo"];
        let statutes: Vec<Statute> = titles
            .iter()
            .enumerate()
            .flat_map(|(k, name)| {
                [
                    federal(&format!("s{}", 2 * k), &format!("{name} Act 1990")),
                    federal(&format!("s{}", 2 * k + 1), &format!("{name} Act (Amendment) 1995")),
                ]
            })
            .collect();
        let source = Arc::new(MemorySource::new(statutes));
        let store = Arc::new(MemoryResultStore::new());
        let cancel = CancelFlag::new();
        let oracle = Arc::new(Pairing {
            calls: AtomicUsize::new(0),
            cancel_on: 3,
            flag: cancel.clone(),
        });
        let config = RunConfig {
            batch_size: 2,
            parallelism: 1,
            ..config(true)
        };

        let dyn_oracle: Arc<dyn GroupingOracle> = oracle.clone();
        let handle = start_run_with_cancel(source, store.clone(), Some(dyn_oracle), config, cancel);
        let (events, summary) = drain(handle).await;

        assert_single_terminal(&events, RunStatus::Stopped);
        assert_eq!(summary.status, RunStatus::Stopped);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
        assert_eq!(summary.counts.batches_total, 5);
        assert_eq!(summary.counts.batches_done, 2);

        let groups = all_groups(&store).await;
        assert_eq!(groups.total, 2);
        for id in ["s0", "s1", "s2", "s3"] {
            assert!(store.group_for_statute(id).await.unwrap().is_some(), "{id} missing");
        }
        for id in ["s4", "s5", "s9"] {
            assert!(store.group_for_statute(id).await.unwrap().is_none(), "{id} present");
        }
        assert!(groups.items.iter().all(|g| g.method == GroupingMethod::Oracle));
    }

    #[tokio::test]
    async fn cancelled_before_start_leaves_store_untouched() {
        let source = Arc::new(MemorySource::new(vec![federal("a", "Police Order 2002")]));
        let store = Arc::new(MemoryResultStore::new());
        let cancel = CancelFlag::new();
        cancel.cancel();
        let handle = start_run_with_cancel(source, store.clone(), None, config(false), cancel);
        let (events, summary) = drain(handle).await;

        assert_single_terminal(&events, RunStatus::Stopped);
        assert_eq!(summary.counts.batches_done, 0);
        assert!(store.current_run().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_source_ends_in_error() {
        let store = Arc::new(MemoryResultStore::new());
        let handle = start_run(Arc::new(FailingSource), store.clone(), None, config(false));
        let mut status = handle.status.clone();
        let (events, summary) = drain(handle).await;

        assert_single_terminal(&events, RunStatus::Error);
        let last = events.last().unwrap();
        assert!(last.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(status.borrow_and_update().status, RunStatus::Error);
        assert!(store.current_run().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unwritable_store_ends_in_error() {
        let source = Arc::new(MemorySource::new(vec![federal("a", "Police Order 2002")]));
        let (events, summary) =
            drain(start_run(source, Arc::new(ReadOnlyStore), None, config(false))).await;

        assert_single_terminal(&events, RunStatus::Error);
        assert!(summary.error.unwrap().contains("read-only"));
    }

    #[tokio::test]
    async fn invalid_config_ends_in_error() {
        let source = Arc::new(MemorySource::new(vec![]));
        let store = Arc::new(MemoryResultStore::new());
        let config = RunConfig {
            batch_size: 0,
            ..config(false)
        };
        let (events, summary) = drain(start_run(source, store, None, config)).await;

        assert_eq!(events.len(), 1);
        assert_single_terminal(&events, RunStatus::Error);
        assert!(summary.error.unwrap().contains("batch_size"));
    }

    #[tokio::test]
    async fn chains_are_detected_per_province() {
        let source = Arc::new(MemorySource::new(vec![
            federal("c1", "Companies Act 1984").with_date("1984-10-08"),
            federal("c2", "Companies (Amendment) Act 2017").with_date("2017-05-30"),
            Statute::titled("p1", "Companies (Amendment) Act 2017").with_jurisdiction("Punjab"),
        ]));
        let store = Arc::new(MemoryResultStore::new());
        let (events, summary) = drain(start_run(source, store.clone(), None, config(false))).await;

        assert_single_terminal(&events, RunStatus::Completed);
        assert_eq!(summary.counts.chains, 1);
        let chains = store.query_chains(&GroupQuery::default()).await.unwrap();
        assert_eq!(chains.total, 1);
        assert_eq!(chains.items[0].jurisdiction, Province::Federal);
        assert_eq!(chains.items[0].base().map(|m| m.statute_id.as_str()), Some("c1"));
    }

    #[tokio::test]
    async fn chain_detection_can_be_disabled() {
        let source = Arc::new(MemorySource::new(vec![
            federal("c1", "Companies Act 1984"),
            federal("c2", "Companies (Amendment) Act 2017"),
        ]));
        let store = Arc::new(MemoryResultStore::new());
        let config = RunConfig {
            detect_chains: false,
            ..config(false)
        };
        let (_, summary) = drain(start_run(source, store, None, config)).await;
        assert_eq!(summary.counts.chains, 0);
        assert_eq!(summary.counts.groups, 1);
    }

    /// Oracle whose answer depends on the batch: a garbled reply for police
    /// statutes, a low-confidence merge of everything for banking, and a
    /// confident pair otherwise.
    struct Mixed;

    const PAIR_AND_SINGLE: &str =
        r#"{"groups":[{"members":[0,1],"confidence":0.9},{"members":[2],"confidence":0.95}]}"#;

    #[async_trait]
    impl GroupingOracle for Mixed {
        async fn propose(&self, _system: &str, user: &str) -> Result<String, OracleError> {
            let reply = if user.contains("Police") {
                "not json"
            } else if user.contains("Banking") {
                r#"{"groups":[{"members":[0,1,2],"confidence":0.3}]}"#
            } else {
                PAIR_AND_SINGLE
            };
            Ok(reply.to_string())
        }

        fn name(&self) -> &str {
            "mixed"
        }
    }

    #[tokio::test]
    async fn mixed_oracle_and_fallback_groups_keep_version_invariants() {
        let source = Arc::new(MemorySource::new(vec![
            federal("c1", "Companies Act 1984").with_date("1984-10-08"),
            federal("c2", "Companies (Amendment) Act 2017").with_date("2017-06-15"),
            federal("b1", "Banking Companies Ordinance 1962").with_date("1962-05-01"),
            federal("a1", "Arms Act 1965").with_date("1965-03-01"),
            federal("a2", "Arms (Amendment) Act 1990").with_date("1990-07-01"),
            federal("e1", "Excise Act 1944"),
            federal("p1", "Police Order (Amendment) Act 2004").with_date("2004-02-01"),
            federal("p2", "Police Order"),
            federal("p3", "Police Order 2002").with_date("2002-08-14"),
        ]));
        let store = Arc::new(MemoryResultStore::new());
        let mut config = config(true);
        config.batch_size = 3;
        let oracle: Arc<dyn GroupingOracle> = Arc::new(Mixed);
        let (events, summary) =
            drain(start_run(source, store.clone(), Some(oracle), config)).await;

        assert_single_terminal(&events, RunStatus::Completed);
        assert_eq!(summary.counts.batches_done, 3);
        assert_eq!(summary.counts.oracle_batches, 2);
        assert_eq!(summary.counts.fallback_batches, 1);

        let groups = all_groups(&store).await;
        assert_eq!(groups.total, 5);
        let mut seen: Vec<&str> = Vec::new();
        for group in &groups.items {
            group.validate().unwrap();
            let originals: Vec<_> = group.members.iter().filter(|m| m.is_original).collect();
            assert_eq!(originals.len(), 1, "group {}", group.base_name);
            assert_eq!(originals[0].version, 1);
            assert_eq!(originals[0].statute.id, group.original_id);
            let versions: Vec<u32> = group.members.iter().map(|m| m.version).collect();
            let expected: Vec<u32> = (1..=group.members.len() as u32).collect();
            assert_eq!(versions, expected, "group {}", group.base_name);
            assert_eq!(group.member_count, group.members.len());
            seen.extend(group.members.iter().map(|m| m.statute.id.as_str()));
        }
        seen.sort_unstable();
        assert_eq!(seen, vec!["a1", "a2", "b1", "c1", "c2", "e1", "p1", "p2", "p3"]);

        let companies = store.group_for_statute("c2").await.unwrap().unwrap();
        assert_eq!(companies.member_count, 2);
        assert_eq!(companies.original_id, "c1");
        let police = store.group_for_statute("p2").await.unwrap().unwrap();
        assert_eq!(police.method, GroupingMethod::Fallback);
        let police_order: Vec<&str> =
            police.members.iter().map(|m| m.statute.id.as_str()).collect();
        assert_eq!(police_order, vec!["p3", "p1", "p2"]);
    }

    #[tokio::test]
    async fn parallel_batches_keep_batch_order() {
        let names = [
            "Arms", "Banking", "Customs", "Defence", "Excise", "Forest", "Gas", "Highways",
            "Irrigation", "Judges", "Katchi Abadis", "Labour",
        ];
        let statutes: Vec<Statute> = names
            .iter()
            .enumerate()
            .map(|(i, name)| federal(&format!("s{i:02}"), &format!("{name} Act 2001")))
            .collect();
        let source = Arc::new(MemorySource::new(statutes));
        let store = Arc::new(MemoryResultStore::new());
        let config = RunConfig {
            batch_size: 2,
            parallelism: 3,
            ..config(false)
        };
        let (events, summary) = drain(start_run(source, store.clone(), None, config)).await;

        assert_single_terminal(&events, RunStatus::Completed);
        assert_eq!(summary.counts.batches_done, 6);
        let groups = all_groups(&store).await;
        let originals: Vec<&str> = groups.items.iter().map(|g| g.original_id.as_str()).collect();
        let expected: Vec<String> = (0..12).map(|i| format!("s{i:02}")).collect();
        assert_eq!(originals, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
