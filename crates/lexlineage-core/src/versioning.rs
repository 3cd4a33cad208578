//! Chronological version assignment within a confirmed group.
//!
//! Members are sorted by resolved date (undated last, stable), numbered
//! 1..=N, and the earliest is flagged as the original. Never fails: a group
//! where nothing is dated keeps input order at reduced confidence.

use crate::chains::{title_marker, without_reference_targets};
use crate::dates::resolve_date;
use crate::group::{NestedStatute, Relation};
use crate::snippet::truncate_chars;
use crate::statute::Statute;

/// Multiplier applied to an undated member in a partly dated group.
const UNDATED_FACTOR: f32 = 0.8;
/// Multiplier applied to every member when no member is dated.
const ALL_UNDATED_FACTOR: f32 = 0.5;
/// How much of the snippet is searched for relation keywords.
const SNIPPET_KEYWORD_CHARS: usize = 500;

/// One member handed to the assigner.
#[derive(Debug, Clone, Copy)]
pub struct VersionInput<'a> {
    pub statute: &'a Statute,
    pub snippet: &'a str,
}

/// Assign versions to the members of one group.
///
/// `group_confidence` is the grouping strategy's confidence; each member's
/// confidence is that value scaled by how well it could be dated.
pub fn assign_versions(inputs: &[VersionInput<'_>], group_confidence: f32) -> Vec<NestedStatute> {
    let mut dated: Vec<(usize, Option<_>)> = inputs
        .iter()
        .enumerate()
        .map(|(i, input)| (i, resolve_date(input.statute)))
        .collect();

    let any_dated = dated.iter().any(|(_, d)| d.is_some());
    if any_dated {
        // Stable: equal dates and all undated members keep input order.
        dated.sort_by_key(|(_, d)| (d.is_none(), d.map(|r| r.date)));
    }

    dated
        .into_iter()
        .enumerate()
        .map(|(pos, (i, resolved))| {
            let input = inputs[i];
            let version = pos as u32 + 1;
            let is_original = version == 1;
            let relation = if is_original {
                Relation::Original
            } else {
                classify_relation(input.statute.title_str().unwrap_or(""), input.snippet)
            };
            let factor = match (any_dated, resolved.is_some()) {
                (false, _) => ALL_UNDATED_FACTOR,
                (true, false) => UNDATED_FACTOR,
                (true, true) => 1.0,
            };
            NestedStatute {
                statute: input.statute.clone(),
                version,
                relation,
                is_original,
                resolved_date: resolved.map(|r| r.date),
                date_source: resolved.map(|r| r.source),
                confidence: (group_confidence * factor).clamp(0.0, 1.0),
            }
        })
        .collect()
}

/// Label a non-original member.
///
/// An amendment marker in the title is final, and matches what the chain
/// detector reports for the same statute. Otherwise title keywords win, and
/// the opening of the snippet is consulted only when the title is silent.
/// Instruments the snippet merely names ("to amend the X Ordinance") are
/// blanked before the scan.
pub fn classify_relation(title: &str, snippet: &str) -> Relation {
    title_marker(title)
        .or_else(|| keyword_relation(title))
        .or_else(|| {
            let opening = truncate_chars(snippet, SNIPPET_KEYWORD_CHARS);
            keyword_relation(&without_reference_targets(opening))
        })
        .unwrap_or(Relation::Amendment)
}

/// Strongest relation keyword in `text`: repeal > ordinance > supplement.
pub fn keyword_relation(text: &str) -> Option<Relation> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |stems: &[&str]| words.iter().any(|w| stems.iter().any(|s| w.starts_with(s)));

    if has(&["repeal"]) {
        Some(Relation::Repeal)
    } else if has(&["ordinance"]) {
        Some(Relation::Ordinance)
    } else if has(&["supplement"]) {
        Some(Relation::Supplement)
    } else {
        None
    }
}
