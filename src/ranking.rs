//! Global Peace Index ranking extraction from report page text.
//!
//! The ranking table is multi-column and wraps country names across lines,
//! so pages are read as one whitespace-separated token stream:
//!
//! ```text
//! RANK COUNTRY SCORE CHANGE
//! 1 Iceland 1.095 ↔  2 Ireland 1.260 UP 1  =3 New
//! Zealand 1.282 DOWN 1 ...
//! ```
//!
//! Rows come out of a small state machine over that stream.

use crate::error::{Result, SafetyError};
use crate::normalize::collapse_whitespace;
use crate::store;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Header line of the overall ranking table.
pub const HEADER_MARKER: &str = "RANK COUNTRY SCORE CHANGE";

/// Fewer distinct countries than this means the table was not read.
pub const MIN_COUNTRIES: usize = 150;

/// Upper bound for a cached table to be trusted.
pub const MAX_CACHED_COUNTRIES: usize = 170;

/// Rank and score tokens a page needs to count as a ranking page when no
/// header is found.
const DENSITY_THRESHOLD: usize = 60;

static RANK_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^=?\d{1,3}$").unwrap());
static SCORE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d\.\d{3}$").unwrap());

/// Trend markers that may follow a score; the directional ones can carry a
/// position delta.
const PLAIN_TRENDS: &[&str] = &["↔", "NEW"];
const DIRECTIONAL_TRENDS: &[&str] = &["UP-LONG", "DOWN-LONG", "UP", "DOWN"];

/// Page-level text of the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingDocument {
    pages: Vec<String>,
}

impl RankingDocument {
    pub fn from_pages(pages: Vec<String>) -> Self {
        Self { pages }
    }

    /// Split `pdftotext` output on form feeds, dropping trailing blank pages.
    pub fn from_form_feed_text(text: &str) -> Self {
        let mut pages: Vec<String> = text.split('\u{000C}').map(str::to_string).collect();
        while matches!(pages.last(), Some(last) if last.trim().is_empty()) {
            pages.pop();
        }
        Self { pages }
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }
}

/// One row of the overall ranking table. Column names match the cache CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    #[serde(rename = "country_gpi")]
    pub country: String,
    #[serde(rename = "gpi_score")]
    pub score: f64,
    /// Tied countries share a rank.
    #[serde(rename = "gpi_rank")]
    pub rank: u32,
}

fn is_rank(token: &str) -> bool {
    RANK_TOKEN.is_match(token)
}

fn is_score(token: &str) -> bool {
    SCORE_TOKEN.is_match(token)
}

/// Pages holding the ranking table.
///
/// Header pages plus the page before each (the top ranks sit there). With
/// no header anywhere, falls back to pages dense in rank and score tokens.
pub fn select_pages(doc: &RankingDocument) -> Vec<usize> {
    let headers: Vec<usize> = doc
        .pages
        .iter()
        .enumerate()
        .filter(|(_, text)| collapse_whitespace(text).contains(HEADER_MARKER))
        .map(|(i, _)| i)
        .collect();

    if !headers.is_empty() {
        let selected: BTreeSet<usize> = headers
            .iter()
            .flat_map(|&i| [i.checked_sub(1), Some(i)])
            .flatten()
            .collect();
        return selected.into_iter().collect();
    }

    debug!("No ranking header found, scanning token density");
    doc.pages
        .iter()
        .enumerate()
        .filter(|(_, text)| {
            let tokens: Vec<&str> = text.split_whitespace().collect();
            let ranks = tokens.iter().filter(|t| is_rank(t)).count();
            let scores = tokens.iter().filter(|t| is_score(t)).count();
            ranks >= DENSITY_THRESHOLD && scores >= DENSITY_THRESHOLD
        })
        .map(|(i, _)| i)
        .collect()
}

enum State<'a> {
    AwaitRank,
    CollectCountry { rank: u32, parts: Vec<&'a str> },
    AwaitScore { rank: u32, parts: Vec<&'a str> },
    AwaitTrend,
}

fn parse_rank(token: &str) -> Option<u32> {
    token.trim_start_matches('=').parse().ok()
}

/// Join wrapped name tokens and apply the one known split-word repair.
fn clean_country(parts: &[&str]) -> String {
    // The 2025 report breaks "Yemen" as "Y emen"; no other split has been
    // observed, so only this one is repaired.
    let joined = parts.join(" ").replace("Y emen", "Yemen");
    collapse_whitespace(&joined)
}

/// Parse one page into rows.
pub fn parse_page(text: &str) -> Vec<RankingRow> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut rows = Vec::new();
    let mut state = State::AwaitRank;
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        state = match state {
            State::AwaitRank => {
                i += 1;
                match parse_rank(token).filter(|_| is_rank(token)) {
                    Some(rank) => State::CollectCountry { rank, parts: Vec::new() },
                    None => State::AwaitRank,
                }
            }
            State::CollectCountry { rank, mut parts } => {
                if is_score(token) {
                    State::AwaitScore { rank, parts }
                } else if is_rank(token) {
                    if parts.is_empty() {
                        // Two ranks in a row: the first was a stray number.
                        i += 1;
                        State::CollectCountry {
                            rank: parse_rank(token).unwrap_or(rank),
                            parts,
                        }
                    } else {
                        // Next row began before a score: drop this one and
                        // re-read the token as a rank.
                        State::AwaitRank
                    }
                } else {
                    parts.push(token);
                    i += 1;
                    State::CollectCountry { rank, parts }
                }
            }
            State::AwaitScore { rank, parts } => {
                i += 1;
                let country = clean_country(&parts);
                match token.parse::<f64>() {
                    Ok(score) if !country.is_empty() && !country.eq_ignore_ascii_case("COUNTRY") => {
                        rows.push(RankingRow { country, score, rank });
                    }
                    _ => debug!("Skipping ranking row {:?}", parts),
                }
                State::AwaitTrend
            }
            State::AwaitTrend => {
                if PLAIN_TRENDS.contains(&token) {
                    i += 1;
                } else if DIRECTIONAL_TRENDS.contains(&token) {
                    i += 1;
                    if tokens.get(i).is_some_and(|next| is_rank(next)) {
                        i += 1;
                    }
                }
                State::AwaitRank
            }
        };
    }

    rows
}

fn distinct_countries(rows: &[RankingRow]) -> usize {
    rows.iter().map(|r| r.country.as_str()).collect::<HashSet<_>>().len()
}

/// Recover the ranking table, first row per country.
///
/// Fails with [`SafetyError::InsufficientExtraction`] when fewer than
/// [`MIN_COUNTRIES`] distinct countries come out; a partial table would skew
/// every composite score downstream.
pub fn extract(doc: &RankingDocument) -> Result<Vec<RankingRow>> {
    let pages = select_pages(doc);
    if pages.is_empty() {
        warn!("Could not locate ranking pages in the report");
    } else {
        debug!("Parsing ranking pages {:?}", pages);
    }

    let rows: Vec<RankingRow> = pages
        .iter()
        .flat_map(|&i| parse_page(&doc.pages[i]))
        .collect();

    let unique = distinct_countries(&rows);
    if unique < MIN_COUNTRIES {
        return Err(SafetyError::InsufficientExtraction {
            rows: rows.len(),
            unique,
            required: MIN_COUNTRIES,
        });
    }

    let mut seen = HashSet::new();
    let deduped: Vec<RankingRow> = rows
        .into_iter()
        .filter(|r| seen.insert(r.country.clone()))
        .collect();

    info!("Extracted {} ranking rows", deduped.len());
    Ok(deduped)
}

/// A cached table is used only if its size looks like a full ranking.
pub fn cache_is_plausible(rows: &[RankingRow]) -> bool {
    (MIN_COUNTRIES..=MAX_CACHED_COUNTRIES).contains(&distinct_countries(rows))
}

/// Read the cache if it passes the shape check, otherwise extract from the
/// document and refresh the cache.
pub fn load_or_extract<F>(cache: Option<&Path>, load_document: F) -> Result<Vec<RankingRow>>
where
    F: FnOnce() -> Result<RankingDocument>,
{
    if let Some(path) = cache.filter(|p| p.exists()) {
        match store::read_ranking_cache(path) {
            Ok(rows) if cache_is_plausible(&rows) => {
                info!("Loaded {} ranking rows from cache {:?}", rows.len(), path);
                return Ok(rows);
            }
            Ok(rows) => warn!(
                "Ignoring ranking cache {:?}: {} distinct countries",
                path,
                distinct_countries(&rows)
            ),
            Err(e) => warn!("Ignoring ranking cache {:?}: {}", path, e),
        }
    }

    let doc = load_document()?;
    let rows = extract(&doc)?;

    if let Some(path) = cache {
        if let Err(e) = store::write_ranking_cache(path, &rows) {
            warn!("Could not write ranking cache {:?}: {}", path, e);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Alphabetic name for index `i` ("Aa", "Ab", ...), never a rank or score.
    fn name(i: usize) -> String {
        let a = (b'A' + (i / 26 % 26) as u8) as char;
        let b = (b'a' + (i % 26) as u8) as char;
        format!("Land{a}{b}")
    }

    fn table_text(count: usize) -> String {
        let trends = ["↔", "UP 2", "DOWN 1", "NEW", "UP-LONG 3", "DOWN-LONG 4"];
        (0..count)
            .map(|i| {
                format!(
                    "{} {} {}.{:03} {}",
                    i + 1,
                    name(i),
                    1 + i % 3,
                    i % 1000,
                    trends[i % trends.len()]
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn doc_with_rows(count: usize) -> RankingDocument {
        RankingDocument::from_pages(vec![
            "Foreword and key findings".to_string(),
            format!("{HEADER_MARKER}\n{}", table_text(count)),
        ])
    }

    #[test]
    fn test_parse_basic_rows() {
        let rows = parse_page("RANK COUNTRY SCORE CHANGE 1 Iceland 1.095 ↔ 2 Ireland 1.260 UP 1");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], RankingRow { country: "Iceland".into(), score: 1.095, rank: 1 });
        assert_eq!(rows[1].country, "Ireland");
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn test_wrapped_names_and_ties() {
        let rows = parse_page("=3 New\nZealand 1.282 DOWN 1\n=3 Bosnia and\nHerzegovina 1.282 NEW");
        assert_eq!(rows[0].country, "New Zealand");
        assert_eq!(rows[0].rank, 3);
        assert_eq!(rows[1].country, "Bosnia and Herzegovina");
        assert_eq!(rows[1].rank, 3);
    }

    #[test]
    fn test_yemen_repair() {
        let rows = parse_page("159 Y emen 3.262 DOWN-LONG 2");
        assert_eq!(rows[0].country, "Yemen");
    }

    #[test]
    fn test_directional_trend_consumes_delta() {
        let rows = parse_page("10 Alpha 1.500 UP-LONG 12 11 Beta 1.600 ↔");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].country, "Beta");
        assert_eq!(rows[1].rank, 11);
    }

    #[test]
    fn test_stray_rank_before_country_restarts_row() {
        let rows = parse_page("12 13 Iceland 1.095");
        assert_eq!(rows, vec![RankingRow { country: "Iceland".into(), score: 1.095, rank: 13 }]);
    }

    #[test]
    fn test_row_without_score_is_dropped() {
        let rows = parse_page("5 Foo 6 Bar 1.500");
        assert_eq!(rows, vec![RankingRow { country: "Bar".into(), score: 1.5, rank: 6 }]);
    }

    #[test]
    fn test_header_word_rows_ignored() {
        assert!(parse_page("1 COUNTRY 1.000").is_empty());
    }

    #[test]
    fn test_header_page_and_predecessor_selected() {
        let doc = RankingDocument::from_pages(vec![
            "intro".into(),
            "top ranks".into(),
            format!("{HEADER_MARKER} ..."),
            "appendix".into(),
        ]);
        assert_eq!(select_pages(&doc), vec![1, 2]);
    }

    #[test]
    fn test_header_on_first_page() {
        let doc = RankingDocument::from_pages(vec!["RANK COUNTRY\nSCORE CHANGE".to_string(), "x".into()]);
        assert_eq!(select_pages(&doc), vec![0]);
    }

    #[test]
    fn test_density_fallback() {
        let doc = RankingDocument::from_pages(vec![
            "no table here".into(),
            table_text(70),
            table_text(40),
        ]);
        assert_eq!(select_pages(&doc), vec![1]);
    }

    #[test]
    fn test_exactly_150_is_accepted() {
        let rows = extract(&doc_with_rows(150)).unwrap();
        assert_eq!(rows.len(), 150);
        assert_eq!(rows[149].rank, 150);
    }

    #[test]
    fn test_149_is_fatal() {
        let err = extract(&doc_with_rows(149)).unwrap_err();
        match err {
            SafetyError::InsufficientExtraction { unique, required, .. } => {
                assert_eq!(unique, 149);
                assert_eq!(required, MIN_COUNTRIES);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_no_pages_is_fatal() {
        let doc = RankingDocument::from_pages(vec!["nothing".into()]);
        assert!(matches!(extract(&doc), Err(SafetyError::InsufficientExtraction { unique: 0, .. })));
    }

    #[test]
    fn test_duplicates_keep_first() {
        let mut text = format!("{HEADER_MARKER}\n{}", table_text(150));
        text.push_str(&format!("\n151 {} 3.999 ↔", name(0)));
        let doc = RankingDocument::from_pages(vec![text]);
        let rows = extract(&doc).unwrap();
        assert_eq!(rows.len(), 150);
        assert_eq!(rows[0].rank, 1);
    }

    #[test]
    fn test_form_feed_split() {
        let doc = RankingDocument::from_form_feed_text("one\u{000C}two\u{000C}\n\u{000C}");
        assert_eq!(doc.pages(), &["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_cache_plausibility_bounds() {
        let rows = |n: usize| -> Vec<RankingRow> {
            (0..n)
                .map(|i| RankingRow { country: name(i), score: 1.0, rank: i as u32 + 1 })
                .collect()
        };
        assert!(!cache_is_plausible(&rows(149)));
        assert!(cache_is_plausible(&rows(150)));
        assert!(cache_is_plausible(&rows(170)));
        assert!(!cache_is_plausible(&rows(171)));
    }

    #[test]
    fn test_load_or_extract_uses_valid_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("gpi.csv");
        let first = load_or_extract(Some(&cache), || Ok(doc_with_rows(155))).unwrap();
        assert!(cache.exists());

        let second = load_or_extract(Some(&cache), || {
            panic!("document should not be loaded when the cache is valid")
        })
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_or_extract_rejects_small_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("gpi.csv");
        let small: Vec<RankingRow> = (0..20)
            .map(|i| RankingRow { country: name(i), score: 2.0, rank: i as u32 + 1 })
            .collect();
        store::write_ranking_cache(&cache, &small).unwrap();

        let rows = load_or_extract(Some(&cache), || Ok(doc_with_rows(160))).unwrap();
        assert_eq!(rows.len(), 160);
        assert_eq!(store::read_ranking_cache(&cache).unwrap().len(), 160);
    }
}
