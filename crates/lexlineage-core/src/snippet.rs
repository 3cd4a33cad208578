//! Bounded contextual excerpts used as grouping evidence.
//!
//! A snippet is the preamble followed by up to `max_sections` leading
//! sections, each clipped to `section_chars`, with the whole clipped to
//! `max_chars`. Budgets are counted in chars, not bytes, and clipping always
//! lands on a char boundary.

use crate::config::SnippetConfig;
use crate::statute::Statute;

/// Derived, per-run excerpt of a statute. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnippet {
    pub statute_id: String,
    pub text: String,
}

impl ContextSnippet {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Build the snippet for one statute.
pub fn build_snippet(statute: &Statute, config: &SnippetConfig) -> ContextSnippet {
    let mut parts: Vec<String> = Vec::with_capacity(config.max_sections + 1);

    if let Some(preamble) = statute.preamble.as_deref().map(str::trim)
        && !preamble.is_empty()
    {
        parts.push(collapse_whitespace(preamble));
    }

    for section in statute.sections.iter().take(config.max_sections) {
        let text = collapse_whitespace(section.text.trim());
        let label = section.label.trim();
        let rendered = match (label.is_empty(), text.is_empty()) {
            (_, true) if label.is_empty() => continue,
            (true, _) => text,
            (false, true) => label.to_string(),
            (false, false) => format!("{label}: {text}"),
        };
        parts.push(truncate_chars(&rendered, config.section_chars).to_string());
    }

    let joined = parts.join("\n\n");
    ContextSnippet {
        statute_id: statute.id.clone(),
        text: truncate_chars(&joined, config.max_chars).to_string(),
    }
}

/// Clip `s` to at most `max` chars.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
