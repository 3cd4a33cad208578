//! The run result set: statute groups and amendment chains.
//!
//! Each run replaces the previous result set wholesale. Queries take equality
//! filters and offset/limit pagination.

use async_trait::async_trait;
use lexlineage_core::{AmendmentChain, Province, StatuteGroup, normalize_base_name};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::StoreError;

/// Equality filters plus pagination. Unset filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupQuery {
    pub run_id: Option<String>,
    pub jurisdiction: Option<Province>,
    /// Compared after normalisation, so a raw title works too.
    pub base_name: Option<String>,
    pub statute_id: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl GroupQuery {
    pub fn jurisdiction(mut self, province: Province) -> Self {
        self.jurisdiction = Some(province);
        self
    }

    pub fn base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = Some(base_name.into());
        self
    }

    pub fn statute_id(mut self, id: impl Into<String>) -> Self {
        self.statute_id = Some(id.into());
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    fn matches_fields(
        &self,
        run_id: &str,
        jurisdiction: Province,
        base_name: &str,
        has_statute: impl Fn(&str) -> bool,
    ) -> bool {
        self.run_id.as_deref().is_none_or(|r| r == run_id)
            && self.jurisdiction.is_none_or(|j| j == jurisdiction)
            && self
                .base_name
                .as_deref()
                .is_none_or(|b| normalize_base_name(b) == base_name)
            && self.statute_id.as_deref().is_none_or(has_statute)
    }

    pub fn matches_group(&self, group: &StatuteGroup) -> bool {
        self.matches_fields(&group.run_id, group.jurisdiction, &group.base_name, |id| {
            group.contains(id)
        })
    }

    pub fn matches_chain(&self, chain: &AmendmentChain) -> bool {
        self.matches_fields(&chain.run_id, chain.jurisdiction, &chain.base_name, |id| {
            chain.members.iter().any(|m| m.statute_id == id)
        })
    }

    fn paginate<'a, T: Clone + 'a>(&self, matching: impl Iterator<Item = &'a T>) -> Page<T> {
        let matching: Vec<&T> = matching.collect();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Page { items, total }
    }
}

/// One page of results and the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Replace the whole result set with one run's output.
    async fn replace_run(
        &self,
        run_id: &str,
        groups: Vec<StatuteGroup>,
        chains: Vec<AmendmentChain>,
    ) -> Result<(), StoreError>;

    async fn query_groups(&self, query: &GroupQuery) -> Result<Page<StatuteGroup>, StoreError>;

    async fn get_group(&self, id: &str) -> Result<Option<StatuteGroup>, StoreError>;

    async fn group_for_statute(&self, statute_id: &str)
    -> Result<Option<StatuteGroup>, StoreError>;

    async fn query_chains(&self, query: &GroupQuery) -> Result<Page<AmendmentChain>, StoreError>;

    /// Id of the run whose results are currently held.
    async fn current_run(&self) -> Result<Option<String>, StoreError>;
}

#[derive(Default)]
struct ResultSet {
    run_id: Option<String>,
    groups: Vec<StatuteGroup>,
    chains: Vec<AmendmentChain>,
}

/// In-memory result store.
#[derive(Default)]
pub struct MemoryResultStore {
    inner: RwLock<ResultSet>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated from an export, e.g. for `lexlineage show`.
    pub fn from_export(export: crate::ResultExport) -> Self {
        Self {
            inner: RwLock::new(ResultSet {
                run_id: Some(export.run_id),
                groups: export.groups,
                chains: export.chains,
            }),
        }
    }

    /// Snapshot of everything currently held.
    pub async fn snapshot(&self) -> (Vec<StatuteGroup>, Vec<AmendmentChain>) {
        let set = self.inner.read().await;
        (set.groups.clone(), set.chains.clone())
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn replace_run(
        &self,
        run_id: &str,
        groups: Vec<StatuteGroup>,
        chains: Vec<AmendmentChain>,
    ) -> Result<(), StoreError> {
        let mut set = self.inner.write().await;
        *set = ResultSet {
            run_id: Some(run_id.to_string()),
            groups,
            chains,
        };
        tracing::debug!(
            run_id,
            groups = set.groups.len(),
            chains = set.chains.len(),
            "result set replaced"
        );
        Ok(())
    }

    async fn query_groups(&self, query: &GroupQuery) -> Result<Page<StatuteGroup>, StoreError> {
        let set = self.inner.read().await;
        Ok(query.paginate(set.groups.iter().filter(|g| query.matches_group(g))))
    }

    async fn get_group(&self, id: &str) -> Result<Option<StatuteGroup>, StoreError> {
        let set = self.inner.read().await;
        Ok(set.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn group_for_statute(
        &self,
        statute_id: &str,
    ) -> Result<Option<StatuteGroup>, StoreError> {
        let set = self.inner.read().await;
        Ok(set.groups.iter().find(|g| g.contains(statute_id)).cloned())
    }

    async fn query_chains(&self, query: &GroupQuery) -> Result<Page<AmendmentChain>, StoreError> {
        let set = self.inner.read().await;
        Ok(query.paginate(set.chains.iter().filter(|c| query.matches_chain(c))))
    }

    async fn current_run(&self) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().await.run_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use lexlineage_core::{GroupingMethod, Statute, VersionInput, assign_versions};

    use super::*;

    fn group(run_id: &str, statutes: &[Statute]) -> StatuteGroup {
        let inputs: Vec<VersionInput<'_>> = statutes
            .iter()
            .map(|s| VersionInput {
                statute: s,
                snippet: "",
            })
            .collect();
        StatuteGroup::assemble(
            run_id,
            Province::of(&statutes[0]),
            GroupingMethod::Fallback,
            assign_versions(&inputs, 0.75),
        )
        .unwrap()
    }

    async fn seeded() -> MemoryResultStore {
        let store = MemoryResultStore::new();
        let groups = vec![
            group(
                "run-1",
                &[
                    Statute::titled("c1", "Companies Act 1984").with_jurisdiction("Federal"),
                    Statute::titled("c2", "Companies (Amendment) Act 2017")
                        .with_jurisdiction("Federal"),
                ],
            ),
            group(
                "run-1",
                &[Statute::titled("p1", "Police Order 2002").with_jurisdiction("Punjab")],
            ),
            group(
                "run-1",
                &[Statute::titled("p2", "Police Order 2002").with_jurisdiction("Sindh")],
            ),
        ];
        store.replace_run("run-1", groups, vec![]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn filters_by_jurisdiction_and_base_name() {
        let store = seeded().await;
        let punjab = store
            .query_groups(&GroupQuery::default().jurisdiction(Province::Punjab))
            .await
            .unwrap();
        assert_eq!(punjab.total, 1);
        assert!(punjab.items[0].contains("p1"));

        let police = store
            .query_groups(&GroupQuery::default().base_name("Police Order"))
            .await
            .unwrap();
        assert_eq!(police.total, 2);
    }

    #[tokio::test]
    async fn lookup_by_statute_and_id() {
        let store = seeded().await;
        let group = store.group_for_statute("c2").await.unwrap().unwrap();
        assert_eq!(group.original_id, "c1");
        let same = store.get_group(&group.id).await.unwrap();
        assert_eq!(same, Some(group));
        assert!(store.group_for_statute("missing").await.unwrap().is_none());

        let by_member = store
            .query_groups(&GroupQuery::default().statute_id("c2"))
            .await
            .unwrap();
        assert_eq!(by_member.total, 1);
    }

    #[tokio::test]
    async fn pagination_reports_total() {
        let store = seeded().await;
        let page = store
            .query_groups(&GroupQuery::default().page(1, 1))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].contains("p1"));

        let past_end = store
            .query_groups(&GroupQuery::default().page(5, 10))
            .await
            .unwrap();
        assert_eq!(past_end.total, 3);
        assert!(past_end.items.is_empty());
    }

    #[tokio::test]
    async fn replace_run_discards_previous_results() {
        let store = seeded().await;
        let next = vec![group(
            "run-2",
            &[Statute::titled("x", "Land Revenue Act 1967").with_jurisdiction("Punjab")],
        )];
        store.replace_run("run-2", next, vec![]).await.unwrap();

        let all = store.query_groups(&GroupQuery::default()).await.unwrap();
        assert_eq!(all.total, 1);
        assert_eq!(store.current_run().await.unwrap().as_deref(), Some("run-2"));
        let stale = GroupQuery {
            run_id: Some("run-1".into()),
            ..GroupQuery::default()
        };
        assert_eq!(store.query_groups(&stale).await.unwrap().total, 0);
    }
}
