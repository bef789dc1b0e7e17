//! Advisory parsing: turns free-text advisory titles into a per-country
//! level index.

use crate::model::{AdvisoryRecord, OverallRisk};
use crate::normalize::normalize;
use crate::resolver::{Resolver, Unmatched};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

const LEVEL_SEPARATOR: &str = " - Level";

/// One raw item from the advisory feed. Only the title is structured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryItem {
    #[serde(rename = "Title", alias = "title", default)]
    pub title: Option<String>,
    #[serde(rename = "Summary", alias = "summary", default)]
    pub summary: Option<String>,
    #[serde(rename = "Link", alias = "link", default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub country_name: String,
    pub level: u8,
    pub overall: OverallRisk,
    /// Title text from "Level" onward, e.g. "Level 2: Exercise Increased Caution"
    pub raw_level_text: String,
}

/// Parse `"<country> - Level N: <label>"`.
///
/// Digits are probed in ascending order ("Level 1" before "Level 2"), not by
/// position in the text. Titles without the separator or a level digit give
/// `None`.
pub fn parse_title(title: &str) -> Option<ParsedTitle> {
    let (country, rest) = title.split_once(LEVEL_SEPARATOR)?;
    let level_part = format!("Level{rest}");

    let level = (1..=4u8).find(|n| level_part.contains(&format!("Level {n}")))?;
    let overall = OverallRisk::from_level(level)?;

    Some(ParsedTitle {
        country_name: country.trim().to_string(),
        level,
        overall,
        raw_level_text: level_part.trim().to_string(),
    })
}

/// Advisories keyed by resolved code, plus the names that did not resolve.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryIndex {
    pub by_code: BTreeMap<String, AdvisoryRecord>,
    pub unmatched: Unmatched,
    /// Parsed titles that resolved to a code, counting overwritten ones.
    pub matched: usize,
    /// Items dropped for an empty or unparsable title.
    pub dropped: usize,
}

impl AdvisoryIndex {
    pub fn get(&self, code: &str) -> Option<&AdvisoryRecord> {
        self.by_code.get(code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Code to 1-4 level.
    pub fn levels(&self) -> BTreeMap<String, u8> {
        self.by_code
            .iter()
            .map(|(code, rec)| (code.clone(), rec.level))
            .collect()
    }
}

/// Parse every item and key it by resolved code. A later item for the same
/// code replaces an earlier one.
pub fn build_advisory_index(items: &[AdvisoryItem], resolver: &Resolver) -> AdvisoryIndex {
    let mut index = AdvisoryIndex::default();

    for item in items {
        let title = item.title.as_deref().unwrap_or_default();
        if title.is_empty() {
            index.dropped += 1;
            continue;
        }
        let Some(parsed) = parse_title(title) else {
            debug!("Dropping advisory without a level: {:?}", title);
            index.dropped += 1;
            continue;
        };

        let Some(resolution) = resolver.resolve(&normalize(&parsed.country_name)) else {
            index.unmatched.record(parsed.country_name);
            continue;
        };

        index.matched += 1;
        index.by_code.insert(
            resolution.code,
            AdvisoryRecord {
                overall: parsed.overall,
                level: parsed.level,
                raw_level_text: parsed.raw_level_text,
                summary_html: item.summary.clone().unwrap_or_default(),
                link: item.link.clone().unwrap_or_default(),
            },
        );
    }

    info!("Built advisory index for {} countries", index.len());
    index.unmatched.log("advisory");
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CountryRecord;
    use crate::tables::ReferenceTables;

    fn item(title: &str, summary: &str, link: &str) -> AdvisoryItem {
        AdvisoryItem {
            title: Some(title.to_string()),
            summary: Some(summary.to_string()),
            link: Some(link.to_string()),
        }
    }

    fn resolver() -> Resolver {
        let registry: Vec<CountryRecord> = [("FR", "France"), ("MM", "Myanmar"), ("CN", "China")]
            .iter()
            .map(|(code, name)| CountryRecord {
                code: code.to_string(),
                name: name.to_string(),
                region: "X".into(),
                subregion: "Y".into(),
                population: None,
                capital: "N/A".into(),
            })
            .collect();
        Resolver::new(&registry, ReferenceTables::embedded().aliases())
    }

    #[test]
    fn test_parse_france_level_two() {
        let p = parse_title("France - Level 2: Exercise Increased Caution").unwrap();
        assert_eq!(p.country_name, "France");
        assert_eq!(p.level, 2);
        assert_eq!(p.overall, OverallRisk::Medium);
        assert_eq!(p.raw_level_text, "Level 2: Exercise Increased Caution");
    }

    #[test]
    fn test_parse_without_separator() {
        assert_eq!(parse_title("Japan Travel Advisory"), None);
        assert_eq!(parse_title("Japan Level 1"), None);
    }

    #[test]
    fn test_parse_without_digit() {
        assert_eq!(parse_title("Chad - Level: Pending"), None);
        assert_eq!(parse_title("Chad - Level 7: Unknown"), None);
    }

    #[test]
    fn test_levels_three_and_four_are_high() {
        assert_eq!(parse_title("Mali - Level 4: Do Not Travel").unwrap().overall, OverallRisk::High);
        assert_eq!(parse_title("Peru - Level 3: Reconsider Travel").unwrap().overall, OverallRisk::High);
    }

    #[test]
    fn test_lowest_digit_wins_over_text_position() {
        let p = parse_title("Testland - Level 3: formerly Level 1").unwrap();
        assert_eq!(p.level, 1);
    }

    #[test]
    fn test_build_index_resolves_and_tracks_unmatched() {
        let items = vec![
            item("France - Level 2: Exercise Increased Caution", "<p>Terrorism</p>", "https://x/fr"),
            item("Burma - Level 4: Do Not Travel", "", ""),
            item("Atlantis - Level 1: Exercise Normal Precautions", "", ""),
            item("Japan Travel Advisory", "", ""),
            AdvisoryItem::default(),
        ];
        let index = build_advisory_index(&items, &resolver());
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("FR").unwrap().link, "https://x/fr");
        assert_eq!(index.get("MM").unwrap().level, 4);
        assert_eq!(index.unmatched.names(), &["Atlantis".to_string()]);
        assert_eq!(index.dropped, 2);
    }

    #[test]
    fn test_build_index_last_write_wins() {
        let items = vec![
            item("Mainland China, Hong Kong & Macau - Level 2: Exercise Increased Caution", "", "a"),
            item("China - Level 3: Reconsider Travel", "", "b"),
        ];
        let index = build_advisory_index(&items, &resolver());
        let cn = index.get("CN").unwrap();
        assert_eq!(cn.level, 3);
        assert_eq!(cn.link, "b");
        assert_eq!(index.matched, 2);
    }

    #[test]
    fn test_feed_item_deserializes_api_casing() {
        let raw = r#"[{"Title": "France - Level 1: x", "Summary": "<b>s</b>", "Link": "l", "Id": 3}]"#;
        let items: Vec<AdvisoryItem> = serde_json::from_str(raw).unwrap();
        assert_eq!(items[0].title.as_deref(), Some("France - Level 1: x"));
        assert_eq!(items[0].summary.as_deref(), Some("<b>s</b>"));
    }
}
