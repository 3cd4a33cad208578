//! Strict validation of oracle responses.
//!
//! The raw text is never trusted: it must decode into the exact partition
//! shape and cover every batch index exactly once, or the whole response is
//! rejected.

use lexlineage_core::ProposedGroup;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPartition {
    groups: Vec<RawGroup>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    members: Vec<usize>,
    confidence: f32,
}

/// A validated oracle response.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionOutcome {
    Partition(Vec<ProposedGroup>),
    Invalid(String),
}

impl PartitionOutcome {
    pub fn is_partition(&self) -> bool {
        matches!(self, Self::Partition(_))
    }
}

/// Remove one surrounding Markdown code fence, if present.
fn strip_fence(raw: &str) -> Result<&str, String> {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return Ok(trimmed);
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .map(str::trim)
        .ok_or_else(|| "unterminated code fence".to_string())
}

/// Validate `raw` as a partition of `0..n`.
pub fn parse_partition(raw: &str, n: usize) -> PartitionOutcome {
    let json = match strip_fence(raw) {
        Ok(json) => json,
        Err(reason) => return PartitionOutcome::Invalid(reason),
    };
    let parsed: RawPartition = match serde_json::from_str(json) {
        Ok(p) => p,
        Err(e) => return PartitionOutcome::Invalid(format!("malformed response: {e}")),
    };

    let mut seen = vec![false; n];
    let mut groups = Vec::with_capacity(parsed.groups.len());
    for (g, group) in parsed.groups.into_iter().enumerate() {
        if group.members.is_empty() {
            return PartitionOutcome::Invalid(format!("group {g} is empty"));
        }
        if !(0.0..=1.0).contains(&group.confidence) {
            return PartitionOutcome::Invalid(format!(
                "group {g} confidence {} outside [0, 1]",
                group.confidence
            ));
        }
        for &i in &group.members {
            match seen.get_mut(i) {
                None => {
                    return PartitionOutcome::Invalid(format!(
                        "index {i} out of range for {n} records"
                    ));
                }
                Some(true) => {
                    return PartitionOutcome::Invalid(format!("index {i} appears more than once"));
                }
                Some(slot) => *slot = true,
            }
        }
        groups.push(ProposedGroup {
            members: group.members,
            confidence: group.confidence,
        });
    }

    if let Some(missing) = seen.iter().position(|s| !s) {
        return PartitionOutcome::Invalid(format!("index {missing} missing from partition"));
    }
    PartitionOutcome::Partition(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(outcome: PartitionOutcome) -> String {
        match outcome {
            PartitionOutcome::Invalid(r) => r,
            PartitionOutcome::Partition(g) => panic!("expected invalid, got {g:?}"),
        }
    }

    #[test]
    fn accepts_valid_partition() {
        let outcome = parse_partition(
            r#"{"groups":[{"members":[0,2],"confidence":0.9},{"members":[1],"confidence":1.0}]}"#,
            3,
        );
        assert_eq!(
            outcome,
            PartitionOutcome::Partition(vec![
                ProposedGroup {
                    members: vec![0, 2],
                    confidence: 0.9
                },
                ProposedGroup {
                    members: vec![1],
                    confidence: 1.0
                },
            ])
        );
    }

    #[test]
    fn tolerates_one_code_fence() {
        let raw = "```json\n{\"groups\":[{\"members\":[0],\"confidence\":0.5}]}\n```";
        assert!(parse_partition(raw, 1).is_partition());
    }

    #[test]
    fn rejects_surrounding_prose() {
        let raw = "Here you go: {\"groups\":[{\"members\":[0],\"confidence\":0.5}]}";
        assert!(reason(parse_partition(raw, 1)).starts_with("malformed"));
    }

    #[test]
    fn rejects_unterminated_fence() {
        let raw = "```json\n{\"groups\":[]}";
        assert_eq!(reason(parse_partition(raw, 0)), "unterminated code fence");
    }

    #[test]
    fn rejects_omitted_index() {
        let raw = r#"{"groups":[{"members":[0,1],"confidence":0.8}]}"#;
        assert_eq!(
            reason(parse_partition(raw, 3)),
            "index 2 missing from partition"
        );
    }

    #[test]
    fn rejects_duplicate_index() {
        let raw = r#"{"groups":[{"members":[0,1],"confidence":0.8},{"members":[1],"confidence":0.8}]}"#;
        assert!(reason(parse_partition(raw, 2)).contains("more than once"));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let raw = r#"{"groups":[{"members":[0,5],"confidence":0.8}]}"#;
        assert!(reason(parse_partition(raw, 2)).contains("out of range"));
    }

    #[test]
    fn rejects_empty_group_and_bad_confidence() {
        let empty = r#"{"groups":[{"members":[],"confidence":0.8},{"members":[0],"confidence":0.8}]}"#;
        assert!(reason(parse_partition(empty, 1)).contains("empty"));
        let bad = r#"{"groups":[{"members":[0],"confidence":1.5}]}"#;
        assert!(reason(parse_partition(bad, 1)).contains("confidence"));
    }

    #[test]
    fn rejects_unknown_fields_and_negative_indices() {
        let extra = r#"{"groups":[{"members":[0],"confidence":0.8,"reason":"same act"}]}"#;
        assert!(!parse_partition(extra, 1).is_partition());
        let negative = r#"{"groups":[{"members":[-1],"confidence":0.8}]}"#;
        assert!(!parse_partition(negative, 1).is_partition());
    }
}
