//! Amendment chain detection.
//!
//! Works over one province's statutes regardless of how they were grouped.
//! An amending statute names its target either in its title ("Companies
//! (Amendment) Act 2017" targets "companies") or in its opening text ("An
//! Act further to amend the Companies Act, 1984"). Each chain starts at the
//! base statute and lists its amendments in date order.
//!
//! Self-references are dropped, a base name claimed by several unmarked
//! statutes resolves to the earliest-dated one (ties by id), and amendments
//! dated before their base are discarded as inconsistent. An unmarked
//! statute that names its own base in the text amends it only when an
//! earlier-dated statute holds that name. Two statutes naming each other
//! keep the earlier one as the base.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;

use crate::base_name::normalize_base_name;
use crate::dates::resolve_date;
use crate::group::{AmendmentChain, ChainMember, Relation};
use crate::province::Province;
use crate::statute::Statute;
use crate::versioning::classify_relation;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:to\s+(amend|repeal)|(amendments?|repeal)\s+(?:of|to|in))\s+(?:the\s+)?([a-z][a-z0-9 '\-]*?\b(?:act|ordinance|order|code|regulations?|rules)\b(?:\s*,?\s*\d{4})?)",
    )
    .expect("static regex")
});

/// A statute-level input to the detector.
#[derive(Debug, Clone, Copy)]
pub struct ChainInput<'a> {
    pub statute: &'a Statute,
    pub snippet: &'a str,
}

/// Title-level amendment marker, if any.
///
/// An instrument called an "Ordinance" is not itself amending; only the
/// amend/repeal/supplement stems mark a lifecycle copy.
pub fn title_marker(title: &str) -> Option<Relation> {
    let lower = title.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let amends = words.iter().any(|w| w.starts_with("amend"));
    let repeals = words.iter().any(|w| w.starts_with("repeal"));
    let supplements = words.iter().any(|w| w.starts_with("supplement"));

    if repeals {
        Some(Relation::Repeal)
    } else if amends && words.contains(&"ordinance") {
        Some(Relation::Ordinance)
    } else if amends {
        Some(Relation::Amendment)
    } else if supplements {
        Some(Relation::Supplement)
    } else {
        None
    }
}

/// `text` with the instrument names of every reference blanked out, leaving
/// the verbs and the referencing instrument's own wording.
pub fn without_reference_targets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in REFERENCE.captures_iter(text) {
        if let Some(target) = caps.get(3) {
            out.push_str(&text[last..target.start()]);
            last = target.end();
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Base name referenced by an "to amend the X Act" style phrase.
pub fn referenced_base(snippet: &str) -> Option<(String, Relation)> {
    let caps = REFERENCE.captures(snippet)?;
    let verb = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();
    let relation = if verb.starts_with("repeal") {
        Relation::Repeal
    } else {
        Relation::Amendment
    };
    let key = normalize_base_name(caps.get(3)?.as_str());
    (!key.is_empty()).then_some((key, relation))
}

struct Candidate<'a> {
    index: usize,
    statute: &'a Statute,
    snippet: &'a str,
    own_key: Option<String>,
    marker: Option<Relation>,
    reference: Option<(String, Relation)>,
    date: Option<NaiveDate>,
}

impl Candidate<'_> {
    fn reference_key(&self) -> Option<&str> {
        self.reference.as_ref().map(|(key, _)| key.as_str())
    }

    fn dated_before(&self, other: &Candidate<'_>) -> bool {
        matches!((self.date, other.date), (Some(a), Some(b)) if a < b)
    }
}

/// Detect amendment chains among one province's statutes.
pub fn detect_chains(
    run_id: &str,
    jurisdiction: Province,
    inputs: &[ChainInput<'_>],
) -> Vec<AmendmentChain> {
    let candidates: Vec<Candidate<'_>> = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let title = input.statute.title_str();
            Candidate {
                index,
                statute: input.statute,
                snippet: input.snippet,
                own_key: title.map(normalize_base_name),
                marker: title.and_then(title_marker),
                reference: referenced_base(input.snippet),
                date: resolve_date(input.statute).map(|r| r.date),
            }
        })
        .collect();

    // Keys claimed by unmarked statutes, with the claimants' indices.
    let mut unmarked_keys: HashMap<&str, Vec<usize>> = HashMap::new();
    for c in candidates.iter().filter(|c| c.marker.is_none()) {
        if let Some(key) = c.own_key.as_deref() {
            unmarked_keys.entry(key).or_default().push(c.index);
        }
    }

    // Unmarked statutes whose text amends another known statute act as
    // amenders and leave the base pool. Naming their own base counts only
    // when an earlier-dated statute holds it.
    let claimants = |key: &str| unmarked_keys.get(key).map(Vec::as_slice).unwrap_or_default();
    let mut referencing: HashSet<usize> = candidates
        .iter()
        .filter(|c| c.marker.is_none())
        .filter(|c| match c.reference_key() {
            Some(key) if c.own_key.as_deref() == Some(key) => claimants(key)
                .iter()
                .any(|&i| candidates[i].dated_before(c)),
            Some(key) => claimants(key).iter().any(|&i| i != c.index),
            None => false,
        })
        .map(|c| c.index)
        .collect();

    // Mutual references would leave both keys without a base; the earlier
    // statute of each such pair stays a base.
    let mut mutual: Vec<usize> = referencing
        .iter()
        .copied()
        .filter(|&i| {
            let c = &candidates[i];
            let Some(key) = c.reference_key() else {
                return false;
            };
            claimants(key).iter().any(|&j| {
                let other = &candidates[j];
                j != i
                    && referencing.contains(&j)
                    && other.reference_key().is_some()
                    && other.reference_key() == c.own_key.as_deref()
                    && base_order(c, other) == Ordering::Less
            })
        })
        .collect();
    mutual.sort_unstable();
    for i in mutual {
        tracing::debug!(
            statute_id = %candidates[i].statute.id,
            "mutual reference, keeping earlier statute as base"
        );
        referencing.remove(&i);
    }

    // Base per key: earliest dated, undated last, ties by id.
    let mut bases: HashMap<&str, usize> = HashMap::new();
    for c in candidates
        .iter()
        .filter(|c| c.marker.is_none() && !referencing.contains(&c.index))
    {
        let Some(key) = c.own_key.as_deref() else {
            continue;
        };
        match bases.get(key) {
            Some(&current) if base_order(&candidates[current], c) != Ordering::Greater => {}
            _ => {
                bases.insert(key, c.index);
            }
        }
    }

    let mut chains: HashMap<usize, Vec<(usize, Relation)>> = HashMap::new();
    for c in &candidates {
        if bases.values().any(|&b| b == c.index) {
            continue;
        }
        let target = match c.marker {
            Some(_) => c
                .own_key
                .as_deref()
                .and_then(|k| bases.get(k))
                .or_else(|| c.reference_key().and_then(|k| bases.get(k))),
            None if referencing.contains(&c.index) => c.reference_key().and_then(|k| bases.get(k)),
            None => None,
        };
        let Some(&base) = target else {
            continue;
        };
        if base == c.index {
            tracing::debug!(statute_id = %c.statute.id, "dropping self-referencing amendment");
            continue;
        }
        if let (Some(base_date), Some(date)) = (candidates[base].date, c.date)
            && date < base_date
        {
            tracing::debug!(
                statute_id = %c.statute.id,
                base_id = %candidates[base].statute.id,
                "dropping amendment dated before its base"
            );
            continue;
        }
        // Same label the version assigner gives this statute.
        let kind = classify_relation(c.statute.title_str().unwrap_or(""), c.snippet);
        chains.entry(base).or_default().push((c.index, kind));
    }

    let mut base_indices: Vec<usize> = chains.keys().copied().collect();
    base_indices.sort_unstable();

    let now = Utc::now();
    base_indices
        .into_iter()
        .filter_map(|base| {
            let mut amendments = chains.remove(&base)?;
            amendments.sort_by(|(a, _), (b, _)| {
                let (a, b) = (&candidates[*a], &candidates[*b]);
                (a.date.is_none(), a.date, a.index).cmp(&(b.date.is_none(), b.date, b.index))
            });

            let base_c = &candidates[base];
            let mut members = Vec::with_capacity(amendments.len() + 1);
            members.push(chain_member(base_c, 0, Relation::Original));
            for (pos, (i, kind)) in amendments.iter().enumerate() {
                members.push(chain_member(&candidates[*i], pos + 1, *kind));
            }

            Some(AmendmentChain {
                id: uuid::Uuid::new_v4().to_string(),
                run_id: run_id.to_string(),
                base_name: base_c.own_key.clone().unwrap_or_default(),
                jurisdiction,
                amendment_count: amendments.len(),
                members,
                created_at: now,
            })
        })
        .collect()
}

fn base_order(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    (a.date.is_none(), a.date, &a.statute.id).cmp(&(b.date.is_none(), b.date, &b.statute.id))
}

fn chain_member(c: &Candidate<'_>, position: usize, amendment_type: Relation) -> ChainMember {
    ChainMember {
        statute_id: c.statute.id.clone(),
        title: c.statute.title.clone(),
        date: c.date,
        position,
        amendment_type,
    }
}
