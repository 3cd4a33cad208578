//! Best-effort date resolution from heterogeneous upstream fields.
//!
//! A statute may carry a commencement date, an assent date, a generic date,
//! or none of these, in one of a handful of textual formats. Resolution walks
//! the candidates in priority order and stops at the first one that parses.
//! Embedded text (title, then preamble) is the last resort.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::base_name::is_year;
use crate::statute::Statute;

/// Which field a resolved date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Commencement,
    Assent,
    Generic,
    Embedded,
}

impl DateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commencement => "commencement",
            Self::Assent => "assent",
            Self::Generic => "generic",
            Self::Embedded => "embedded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commencement" => Some(Self::Commencement),
            "assent" => Some(Self::Assent),
            "generic" => Some(Self::Generic),
            "embedded" => Some(Self::Embedded),
            _ => None,
        }
    }
}

/// A raw field that might hold a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCandidate<'a> {
    Commencement(&'a str),
    Assent(&'a str),
    Generic(&'a str),
    /// Free text (title, preamble) that may mention a date or a year.
    Embedded(&'a str),
}

impl DateCandidate<'_> {
    pub fn source(&self) -> DateSource {
        match self {
            Self::Commencement(_) => DateSource::Commencement,
            Self::Assent(_) => DateSource::Assent,
            Self::Generic(_) => DateSource::Generic,
            Self::Embedded(_) => DateSource::Embedded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

/// Candidate fields in priority order.
pub fn candidates(statute: &Statute) -> Vec<DateCandidate<'_>> {
    let mut out = Vec::with_capacity(5);
    if let Some(s) = statute.commencement_date.as_deref() {
        out.push(DateCandidate::Commencement(s));
    }
    if let Some(s) = statute.assent_date.as_deref() {
        out.push(DateCandidate::Assent(s));
    }
    if let Some(s) = statute.date.as_deref() {
        out.push(DateCandidate::Generic(s));
    }
    if let Some(s) = statute.title.as_deref() {
        out.push(DateCandidate::Embedded(s));
    }
    if let Some(s) = statute.preamble.as_deref() {
        out.push(DateCandidate::Embedded(s));
    }
    out
}

/// Extract a date from a single candidate.
pub fn extract(candidate: DateCandidate<'_>) -> Option<ResolvedDate> {
    let date = match candidate {
        DateCandidate::Commencement(s) | DateCandidate::Assent(s) | DateCandidate::Generic(s) => {
            parse_date(s)
        }
        DateCandidate::Embedded(s) => scan_text(s),
    }?;
    Some(ResolvedDate {
        date,
        source: candidate.source(),
    })
}

/// Resolve the best date for a statute, or `None` when nothing parses.
pub fn resolve_date(statute: &Statute) -> Option<ResolvedDate> {
    candidates(statute).into_iter().find_map(extract)
}

const FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%B %d %Y",
];

/// Parse one of the recognised textual date formats.
///
/// Accepts ISO dates (optionally followed by a time), numeric day-first
/// dates, "15th June, 2017", "June 15, 2017", "15 day of June 2017" and a
/// bare year, which resolves to 1 January.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // ISO timestamps: "2017-06-15T00:00:00Z".
    if let Some(prefix) = s.get(..10)
        && let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
    {
        return Some(date);
    }

    let cleaned = clean_date_words(s);
    if let Some(date) = FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
    {
        return Some(date);
    }

    if is_year(&cleaned) {
        let year = cleaned.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

/// Scan free text for the first full date phrase, falling back to the first
/// plausible year.
fn scan_text(text: &str) -> Option<NaiveDate> {
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|w| w.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | ';' | ':' | '"')))
        .map(|w| w.trim_end_matches('.'))
        .filter(|w| !w.is_empty())
        .collect();

    for i in 0..words.len() {
        for width in [3, 1] {
            if let Some(window) = words.get(i..i + width)
                && window.iter().any(|w| w.bytes().any(|b| b.is_ascii_digit()))
                && !(width == 1 && is_year(window[0]))
                && let Some(date) = parse_date(&window.join(" "))
            {
                return Some(date);
            }
        }
    }

    words
        .iter()
        .find(|w| is_year(w))
        .and_then(|y| NaiveDate::from_ymd_opt(y.parse().ok()?, 1, 1))
}

/// Strip commas, ordinal suffixes ("15th") and filler ("day of").
fn clean_date_words(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .filter(|w| !w.eq_ignore_ascii_case("day") && !w.eq_ignore_ascii_case("of"))
        .map(strip_ordinal)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_ordinal(word: &str) -> &str {
    let digits = word.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits == word.len() {
        return word;
    }
    match word[digits..].to_ascii_lowercase().as_str() {
        "st" | "nd" | "rd" | "th" => &word[..digits],
        _ => word,
    }
}
