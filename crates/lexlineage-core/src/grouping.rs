//! Group candidates and the deterministic fallback strategy.
//!
//! The fallback groups a batch purely by base-name equality. It cannot cross
//! a jurisdiction (batches are already single-province) and it cannot
//! hallucinate, at the cost of lower recall than the oracle.

use std::collections::HashMap;

use chrono::Datelike;

use crate::base_name::normalize_base_name;
use crate::dates::resolve_date;
use crate::group::GroupingMethod;
use crate::province::Province;
use crate::snippet::ContextSnippet;
use crate::statute::Statute;

/// Confidence assigned to multi-member fallback groups.
pub const FALLBACK_CONFIDENCE: f32 = 0.75;

/// One statute as presented to a grouping strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub statute_id: String,
    pub title: Option<String>,
    pub jurisdiction: Province,
    pub year: Option<i32>,
    pub snippet: String,
}

impl BatchItem {
    pub fn new(statute: &Statute, snippet: &ContextSnippet) -> Self {
        Self {
            statute_id: statute.id.clone(),
            title: statute.title_str().map(str::to_string),
            jurisdiction: Province::of(statute),
            year: resolve_date(statute).map(|r| r.date.year()),
            snippet: snippet.text.clone(),
        }
    }

    pub fn base_name(&self) -> Option<String> {
        self.title.as_deref().map(normalize_base_name)
    }
}

/// A partition group over local batch indices with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedGroup {
    pub members: Vec<usize>,
    pub confidence: f32,
}

/// Statute ids believed to be one instrument, confined to one province.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCandidate {
    pub jurisdiction: Province,
    pub statute_ids: Vec<String>,
    pub method: GroupingMethod,
    pub confidence: f32,
    /// Index of the batch that produced this candidate within its run.
    pub batch: usize,
}

/// Group a batch by normalised base name.
///
/// Groups appear in order of their first member; members keep input order.
/// Untitled statutes cannot be compared and each become a singleton.
pub fn fallback_groups(items: &[BatchItem]) -> Vec<ProposedGroup> {
    let keys: Vec<Option<String>> = items.iter().map(BatchItem::base_name).collect();
    group_by_key(&keys, (0..items.len()).collect())
}

/// Split low-confidence oracle merges whose members disagree on base name.
///
/// A group at or above `floor`, or whose members all share a base name, is
/// kept as proposed. Otherwise the fallback rule is applied inside it.
pub fn apply_confidence_floor(
    groups: Vec<ProposedGroup>,
    items: &[BatchItem],
    floor: f32,
) -> Vec<ProposedGroup> {
    let keys: Vec<Option<String>> = items.iter().map(BatchItem::base_name).collect();
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        let first_key = group.members.first().and_then(|&i| keys[i].as_ref());
        let uniform = first_key.is_some()
            && group
                .members
                .iter()
                .all(|&i| keys[i].as_ref() == first_key);
        if group.confidence >= floor || uniform || group.members.len() < 2 {
            out.push(group);
            continue;
        }
        tracing::debug!(
            members = group.members.len(),
            confidence = group.confidence,
            floor,
            "splitting low-confidence oracle merge by base name"
        );
        out.extend(group_by_key(&keys, group.members));
    }
    out
}

fn group_by_key(keys: &[Option<String>], members: Vec<usize>) -> Vec<ProposedGroup> {
    let mut order: Vec<Vec<usize>> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();

    for i in members {
        match keys[i].as_deref() {
            Some(key) => match slot.get(key) {
                Some(&g) => order[g].push(i),
                None => {
                    slot.insert(key, order.len());
                    order.push(vec![i]);
                }
            },
            None => order.push(vec![i]),
        }
    }

    order
        .into_iter()
        .map(|members| ProposedGroup {
            confidence: if members.len() == 1 {
                1.0
            } else {
                FALLBACK_CONFIDENCE
            },
            members,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, title: Option<&str>) -> BatchItem {
        BatchItem {
            statute_id: id.to_string(),
            title: title.map(str::to_string),
            jurisdiction: Province::Federal,
            year: None,
            snippet: String::new(),
        }
    }

    fn member_sets(groups: &[ProposedGroup]) -> Vec<Vec<usize>> {
        groups.iter().map(|g| g.members.clone()).collect()
    }

    #[test]
    fn fallback_groups_by_base_name() {
        let items = vec![
            item("a", Some("Companies Act 1984")),
            item("b", Some("Companies Act (Amendment) 2017")),
            item("c", Some("Criminal Procedure Code 1898")),
        ];
        let groups = fallback_groups(&items);
        assert_eq!(member_sets(&groups), vec![vec![0, 1], vec![2]]);
        assert_eq!(groups[0].confidence, FALLBACK_CONFIDENCE);
        assert_eq!(groups[1].confidence, 1.0);
    }

    #[test]
    fn fallback_keeps_first_appearance_order() {
        let items = vec![
            item("a", Some("Police Order 2002")),
            item("b", Some("Companies Act 1984")),
            item("c", Some("Police Order (Amendment) 2004")),
        ];
        assert_eq!(member_sets(&fallback_groups(&items)), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn untitled_statutes_are_singletons() {
        let items = vec![item("a", None), item("b", None), item("c", Some("A Act"))];
        assert_eq!(
            member_sets(&fallback_groups(&items)),
            vec![vec![0], vec![1], vec![2]]
        );
    }

    #[test]
    fn fallback_is_a_partition() {
        let items: Vec<BatchItem> = (0..12)
            .map(|i| item(&i.to_string(), Some(&format!("Act number {} 19{:02}", i % 4, i))))
            .collect();
        let groups = fallback_groups(&items);
        let mut seen: Vec<usize> = groups.iter().flat_map(|g| g.members.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn confidence_floor_splits_weak_mixed_merge() {
        let items = vec![
            item("a", Some("Companies Act 1984")),
            item("b", Some("Criminal Procedure Code 1898")),
            item("c", Some("Companies Act (Amendment) 2017")),
        ];
        let proposed = vec![ProposedGroup {
            members: vec![0, 1, 2],
            confidence: 0.4,
        }];
        let groups = apply_confidence_floor(proposed, &items, 0.6);
        assert_eq!(member_sets(&groups), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn confidence_floor_keeps_confident_or_uniform_merges() {
        let items = vec![
            item("a", Some("Companies Act 1984")),
            item("b", Some("Companies Ordinance 2002")),
            item("c", Some("Companies Act (Amendment) 2017")),
            item("d", Some("Securities Act 2015")),
        ];
        let proposed = vec![
            ProposedGroup {
                members: vec![0, 1, 2],
                confidence: 0.3,
            },
            ProposedGroup {
                members: vec![3],
                confidence: 0.2,
            },
        ];
        let kept = apply_confidence_floor(proposed.clone(), &items, 0.6);
        assert_eq!(kept, proposed);

        let confident = vec![ProposedGroup {
            members: vec![0, 3],
            confidence: 0.9,
        }];
        assert_eq!(apply_confidence_floor(confident.clone(), &items, 0.6), confident);
    }
}
