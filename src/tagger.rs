//! Keyword tagging: risk tags and display excerpts from advisory HTML.
//!
//! Replaces a full HTML parse with a regex tag strip; advisory summaries are
//! short and only need to read as plain text.

use crate::normalize::collapse_whitespace;
use crate::tables::KeywordLabel;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

/// Maximum tags returned by [`tag`].
pub const MAX_TAGS: usize = 3;

/// Maximum excerpt length in characters, before the ellipsis.
pub const EXCERPT_LEN: usize = 260;

// ── HTML to text ────────────────────────────────────────────────────

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Decode character references the way an HTML parser does in text: the
/// full named set, numeric forms and the legacy names that may omit the
/// semicolon. Unknown names are left untouched. Markup is escaped first so
/// only references are touched.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let escaped = text.replace('<', "&lt;");
    Html::parse_fragment(&escaped).root_element().text().collect()
}

/// Advisory HTML to lower-case plain text with single spaces. Non-breaking
/// spaces count as whitespace.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let unescaped = unescape_entities(html);
    let stripped = TAG_PATTERN.replace_all(&unescaped, " ");
    collapse_whitespace(&stripped).to_lowercase()
}

// ── Tags and excerpts ───────────────────────────────────────────────

/// Up to three risk labels whose keyword occurs in the text, in table order
/// and without duplicates.
pub fn tag(html: &str, keywords: &[KeywordLabel]) -> Vec<String> {
    let text = html_to_text(html);
    if text.is_empty() {
        return Vec::new();
    }

    let mut found: Vec<String> = Vec::new();
    for entry in keywords {
        if found.len() == MAX_TAGS {
            break;
        }
        if text.contains(entry.keyword.as_str()) && !found.contains(&entry.label) {
            found.push(entry.label.clone());
        }
    }
    found
}

/// Short plain-text excerpt for display. Cuts at the last whole word within
/// [`EXCERPT_LEN`] characters and appends "..." when shortened.
pub fn excerpt(html: &str) -> String {
    let text = html_to_text(html);
    if text.chars().count() <= EXCERPT_LEN {
        return text;
    }

    let cut: String = text.chars().take(EXCERPT_LEN).collect();
    let head = match cut.rfind(' ') {
        Some(pos) => &cut[..pos],
        None => cut.as_str(),
    };
    format!("{head}...")
}
