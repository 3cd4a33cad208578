//! Base-name normalisation for statute titles.
//!
//! Reduces a title to a comparison key so that lifecycle copies of the same
//! instrument ("Companies Act 1984", "Companies Act (Amendment) 2017",
//! "The Companies (Amendment) Ordinance, 2002") collapse to the same string.
//!
//! # Rules
//!
//! 1. Lower-case.
//! 2. Bracketed or parenthesised groups are dropped when they carry an
//!    amendment marker or a year, e.g. "(Amendment)", "[1997]",
//!    "(Second Amendment, 2010)". Other bracket contents are kept.
//! 3. Amendment/version marker words are removed wherever they appear.
//! 4. Punctuation collapses to single spaces.
//! 5. Trailing years (1800-2099), version tokens, connectors and legal
//!    suffixes ("act", "ordinance", "code", ...) are stripped repeatedly,
//!    as is a leading "the".
//!
//! Numerals inside the name ("Eighteenth", "Section 144") survive. When the
//! rules would leave nothing, the collapsed lower-case title is the key.
//! The function is idempotent.

use std::sync::LazyLock;

use regex::Regex;

/// Words that mark a lifecycle copy rather than a different instrument.
const MARKER_WORDS: &[&str] = &[
    "amendment",
    "amendments",
    "amended",
    "amending",
    "repeal",
    "repealed",
    "repealing",
    "revised",
    "revision",
    "supplementary",
    "supplemental",
    "consolidated",
    "version",
];

/// Ordinals that only ever qualify a marker ("Second Amendment").
const ORDINAL_WORDS: &[&str] = &[
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

/// Tokens stripped only when they trail the name.
const TRAILING_SUFFIXES: &[&str] = &[
    "act",
    "acts",
    "ordinance",
    "order",
    "code",
    "rules",
    "regulation",
    "regulations",
    "bill",
    "of",
    "the",
    "no",
];

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(\[]([^()\[\]]*)[)\]]").expect("static regex"));

/// Normalise a title into its base-name comparison key.
pub fn normalize_base_name(title: &str) -> String {
    let lower = title.to_lowercase();

    let debracketed = BRACKETED.replace_all(&lower, |caps: &regex::Captures<'_>| {
        let inner = &caps[1];
        if tokens(inner).any(|t| is_marker(t) || is_year(t)) {
            " ".to_string()
        } else {
            format!(" {inner} ")
        }
    });

    let collapsed: Vec<&str> = tokens(&debracketed).collect();
    let fallback = collapsed.join(" ");

    let mut kept: Vec<&str> = collapsed
        .iter()
        .copied()
        .filter(|t| !is_marker(t))
        .collect();

    // "Second Amendment" leaves a dangling ordinal once the marker is gone.
    while let Some(last) = kept.last() {
        if is_year(last) || is_version_token(last) || TRAILING_SUFFIXES.contains(last) {
            kept.pop();
        } else if ORDINAL_WORDS.contains(last) && collapsed.iter().any(|t| is_marker(t)) {
            kept.pop();
        } else {
            break;
        }
    }

    let leading_articles = kept.iter().take_while(|&&t| t == "the").count();
    kept.drain(..leading_articles);

    if kept.is_empty() {
        fallback
    } else {
        kept.join(" ")
    }
}

/// Split on anything that is not a letter or digit.
fn tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty())
}

fn is_marker(token: &str) -> bool {
    MARKER_WORDS.contains(&token)
}

/// Four-digit year in the range statutes are dated in.
pub fn is_year(token: &str) -> bool {
    token.len() == 4
        && token.bytes().all(|b| b.is_ascii_digit())
        && token
            .parse::<u16>()
            .is_ok_and(|y| (1800..=2099).contains(&y))
}

/// "v2", "v10": trailing version tags.
fn is_version_token(token: &str) -> bool {
    token.len() > 1
        && token.starts_with('v')
        && token[1..].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_suffix_stripped() {
        assert_eq!(normalize_base_name("Companies Act 1984"), "companies");
    }

    #[test]
    fn bracketed_amendment_stripped() {
        assert_eq!(normalize_base_name("Companies Act (Amendment) 2017"), "companies");
        assert_eq!(normalize_base_name("The Companies (Amendment) Ordinance, 2002"), "companies");
    }

    #[test]
    fn lifecycle_copies_share_a_key() {
        let original = normalize_base_name("Punjab Local Government Act, 2013");
        let amended = normalize_base_name("Punjab Local Government (Amendment) Act, 2016");
        let second = normalize_base_name("Punjab Local Government (Second Amendment) Act 2017");
        let revised = normalize_base_name("PUNJAB LOCAL GOVERNMENT ACT 2013 [Revised]");
        assert_eq!(original, "punjab local government");
        assert_eq!(amended, original);
        assert_eq!(second, original);
        assert_eq!(revised, original);
    }

    #[test]
    fn different_instruments_differ() {
        assert_ne!(
            normalize_base_name("Companies Act 1984"),
            normalize_base_name("Criminal Procedure Code 1898")
        );
        assert_eq!(normalize_base_name("Criminal Procedure Code 1898"), "criminal procedure");
    }

    #[test]
    fn substantive_numerals_survive() {
        assert_eq!(
            normalize_base_name("Constitution (Eighteenth Amendment) Act, 2010"),
            "constitution"
        );
        assert_eq!(normalize_base_name("Section 144 Order 2020"), "section 144");
        assert_eq!(normalize_base_name("Finance (No. 2) Act 2019"), "finance no 2");
    }

    #[test]
    fn non_marker_brackets_kept() {
        assert_eq!(
            normalize_base_name("Local Government (Elections) Act 2005"),
            "local government elections"
        );
    }

    #[test]
    fn version_words_stripped() {
        assert_eq!(normalize_base_name("Police Order 2002 v2"), "police");
        assert_eq!(normalize_base_name("Police Order, 2002 (Amended Version)"), "police");
    }

    #[test]
    fn punctuation_and_whitespace_collapse() {
        assert_eq!(
            normalize_base_name("  Workers'   Welfare   Fund -- Ordinance,1971 "),
            "workers welfare fund"
        );
    }

    #[test]
    fn all_stripped_falls_back_to_collapsed_title() {
        assert_eq!(normalize_base_name("Act 1984"), "act 1984");
        assert_eq!(normalize_base_name(""), "");
    }

    #[test]
    fn idempotent() {
        let titles = [
            "Companies Act 1984",
            "Companies Act (Amendment) 2017",
            "Constitution (Eighteenth Amendment) Act, 2010",
            "Act 1984",
            "Finance (No. 2) Act 2019",
            "The Punjab Second Amendment Ordinance",
            "Police Order, 2002 (Amended Version)",
            "",
        ];
        for title in titles {
            let once = normalize_base_name(title);
            let twice = normalize_base_name(&once);
            assert_eq!(once, twice, "not idempotent for {title:?}");
        }
    }

    #[test]
    fn year_bounds() {
        assert!(is_year("1898"));
        assert!(is_year("2099"));
        assert!(!is_year("1799"));
        assert!(!is_year("144"));
        assert!(!is_year("20a0"));
    }
}
