//! Prompt templates for the grouping oracle.

use std::fmt::Write;

use lexlineage_core::BatchItem;

pub const SYSTEM_PROMPT: &str = "\
You are a legal records analyst reconstructing the lineage of Pakistani statutes.

You will receive a numbered list of statute records from a single jurisdiction. Several records \
may describe the same legal instrument at different points in its life: the original enactment, \
later amendments, ordinances, repeals, or supplementary acts.

Partition the records into groups so that each group holds the records of exactly one instrument.

Rules:
- Group records only when they have the same legal meaning. Ignore differences in formatting, \
capitalisation, punctuation, years, and amendment markers in the title.
- Never merge records from different jurisdictions.
- Every index must appear in exactly one group. A record with no match forms its own group.
- confidence is your certainty that the group is correct, between 0.0 and 1.0.

Respond ONLY with a JSON object. No markdown fences, no explanation, just raw JSON:
{\"groups\": [{\"members\": [0, 2], \"confidence\": 0.9}, {\"members\": [1], \"confidence\": 1.0}]}";

/// Render the batch as an indexed list for the oracle.
pub fn build_user_prompt(items: &[BatchItem]) -> String {
    let jurisdiction = items
        .first()
        .map(|i| i.jurisdiction.display_name())
        .unwrap_or("Unknown");

    let mut out = format!(
        "Jurisdiction: {jurisdiction}\n\
         Records: {n}\n",
        n = items.len(),
    );

    for (index, item) in items.iter().enumerate() {
        let _ = write!(
            out,
            "\n[{index}] id: {id}\n\
             Title: {title}\n\
             Year: {year}\n\
             Context:\n\
             {snippet}\n",
            id = item.statute_id,
            title = item.title.as_deref().unwrap_or("(untitled)"),
            year = item
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            snippet = if item.snippet.is_empty() {
                "(none)"
            } else {
                item.snippet.as_str()
            },
        );
    }
    out
}
