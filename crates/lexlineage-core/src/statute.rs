//! Statute records as delivered by the upstream store.

use serde::{Deserialize, Serialize};

/// A single numbered or labelled section of a statute body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub text: String,
}

impl Section {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// A legal-document record. Read-only input to the grouping engine.
///
/// Every field except `id` tolerates absence: upstream schema gaps degrade to
/// the `unknown` province or an empty snippet rather than failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statute {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// Date the statute came into force, as produced upstream.
    #[serde(default)]
    pub commencement_date: Option<String>,
    /// Date of assent / promulgation.
    #[serde(default)]
    pub assent_date: Option<String>,
    /// Catch-all date field with no declared meaning.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub preamble: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Statute {
    /// Minimal statute with only an id and a title. Mostly useful in tests
    /// and fixtures; real records arrive through a `StatuteSource`.
    pub fn titled(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            jurisdiction: None,
            commencement_date: None,
            assent_date: None,
            date: None,
            preamble: None,
            sections: Vec::new(),
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn with_section(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.sections.push(Section::new(label, text));
        self
    }

    /// Title with surrounding whitespace removed; empty titles count as absent.
    pub fn title_str(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
