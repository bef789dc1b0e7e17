//! Country-name normalization: turns free-text names from any source into
//! a lookup key.
//!
//! Keys are never displayed; they only need to agree across sources.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());

static TRAVEL_ADVISORY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s*travel advisory)+\s*$").unwrap());

static LEADING_THE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:the\s+)+").unwrap());

/// Decompose and drop combining marks: "Côte" → "Cote".
pub fn strip_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapse whitespace runs to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Normalize a country name into a matching key.
///
/// Steps, in order: strip diacritics, lower-case, drop parenthetical groups,
/// drop a trailing "Travel Advisory", drop a leading "the ", collapse
/// whitespace. Total and idempotent; empty input gives an empty key.
pub fn normalize(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    // Lower-casing can itself emit combining marks (e.g. 'İ'), so strip twice.
    let folded = strip_diacritics(&strip_diacritics(raw).to_lowercase());
    let collapsed = collapse_whitespace(&folded);
    let without_parens = PARENTHETICAL.replace_all(&collapsed, "");
    let without_suffix = TRAVEL_ADVISORY_SUFFIX.replace(without_parens.trim(), "");
    let without_article = LEADING_THE.replace(without_suffix.trim(), "");
    collapse_whitespace(&without_article)
}
