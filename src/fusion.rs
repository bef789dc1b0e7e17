//! Risk fusion: one [`RiskRecord`] per registry country from the advisory
//! index, preset overrides and the generic defaults.
//!
//! Field precedence:
//!
//! | field                         | order                                   |
//! |-------------------------------|-----------------------------------------|
//! | `overall_risk`                | advisory, preset, `unknown`             |
//! | `risk_scores`                 | level table, then preset per category   |
//! | `top_risks`                   | preset, summary tags, generic fallback  |
//! | `advisory_excerpt` / `_link`  | preset, live advisory, empty            |
//! | contacts, tip, playbook       | preset, generic default                 |
//! | `region`                      | registry, preset                        |

use crate::advisory::AdvisoryIndex;
use crate::model::{CountryRecord, OverallRisk, Playbook, RiskRecord};
use crate::tables::{PresetMap, ReferenceTables};
use crate::tagger;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Fuse every registry country. Codes missing from the advisory index and
/// the preset map still get a record built from defaults.
pub fn fuse(
    registry: &[CountryRecord],
    advisories: &AdvisoryIndex,
    presets: &PresetMap,
    tables: &ReferenceTables,
) -> BTreeMap<String, RiskRecord> {
    let defaults = tables.defaults();
    let mut fused = BTreeMap::new();

    for country in registry {
        let preset = presets.get(&country.code).cloned().unwrap_or_default();
        let advisory = advisories.get(&country.code);

        let overall_risk = advisory
            .map(|a| a.overall)
            .or(preset.overall_risk)
            .unwrap_or(OverallRisk::Unknown);

        let mut risk_scores = overall_risk.default_scores();
        if let Some(partial) = &preset.risk_scores {
            risk_scores = risk_scores.overlay(partial);
        }

        let summary_html = advisory.map(|a| a.summary_html.as_str()).unwrap_or_default();
        let top_risks = match preset.top_risks {
            Some(risks) => risks,
            None => {
                let tags = tagger::tag(summary_html, tables.keywords());
                if tags.is_empty() {
                    defaults.top_risks.clone()
                } else {
                    tags
                }
            }
        };

        let advisory_excerpt = preset
            .advisory_excerpt
            .unwrap_or_else(|| tagger::excerpt(summary_html));
        let advisory_link = preset
            .advisory_link
            .or_else(|| advisory.map(|a| a.link.clone()))
            .unwrap_or_default();

        let region = if country.region.is_empty() {
            preset.region.unwrap_or_default()
        } else {
            country.region.clone()
        };

        let record = RiskRecord {
            code: country.code.clone(),
            name: country.name.clone(),
            region,
            subregion: country.subregion.clone(),
            overall_risk,
            risk_scores,
            top_risks,
            emergency_contacts: preset
                .emergency_contacts
                .unwrap_or_else(|| defaults.emergency_contacts.clone()),
            mindset_tip: preset
                .mindset_tip
                .unwrap_or_else(|| defaults.mindset_tip.clone()),
            playbook: preset.playbook.unwrap_or_else(Playbook::new),
            advisory_excerpt,
            advisory_link,
            is_core_country: tables.is_core_country(&country.code),
        };
        debug!("Fused {} as {}", record.code, record.overall_risk);
        fused.insert(country.code.clone(), record);
    }

    info!(
        "Fused {} countries ({} with advisories, {} core)",
        fused.len(),
        fused.keys().filter(|c| advisories.get(c).is_some()).count(),
        fused.values().filter(|r| r.is_core_country).count()
    );
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdvisoryRecord, PartialRiskScores, Preset, RiskScores};
    use proptest::prelude::*;

    fn country(code: &str, name: &str, region: &str) -> CountryRecord {
        CountryRecord {
            code: code.to_string(),
            name: name.to_string(),
            region: region.to_string(),
            subregion: String::new(),
            population: Some(1_000),
            capital: "N/A".to_string(),
        }
    }

    fn advisory(level: u8, summary: &str, link: &str) -> AdvisoryRecord {
        AdvisoryRecord {
            overall: OverallRisk::from_level(level).unwrap(),
            level,
            raw_level_text: format!("Level {level}: x"),
            summary_html: summary.to_string(),
            link: link.to_string(),
        }
    }

    fn index(entries: Vec<(&str, AdvisoryRecord)>) -> AdvisoryIndex {
        AdvisoryIndex {
            by_code: entries.into_iter().map(|(c, a)| (c.to_string(), a)).collect(),
            ..Default::default()
        }
    }

    fn tables() -> &'static ReferenceTables {
        ReferenceTables::embedded()
    }

    #[test]
    fn test_uncovered_country_gets_defaults() {
        let registry = vec![country("ZZ", "Zedland", "Nowhere")];
        let fused = fuse(&registry, &AdvisoryIndex::default(), &PresetMap::empty(), tables());
        let rec = &fused["ZZ"];
        assert_eq!(rec.overall_risk, OverallRisk::Unknown);
        assert_eq!(rec.risk_scores, RiskScores::new(3, 3, 3, 3));
        assert_eq!(rec.top_risks, tables().defaults().top_risks);
        assert_eq!(rec.top_risks.len(), 2);
        assert_eq!(rec.advisory_excerpt, "");
        assert_eq!(rec.advisory_link, "");
        assert!(rec.playbook.is_empty());
        assert!(!rec.is_core_country);
    }

    #[test]
    fn test_advisory_drives_level_and_tags() {
        let registry = vec![country("MX", "Mexico", "Americas")];
        let advisories = index(vec![(
            "MX",
            advisory(2, "<p>Violent crime and kidnapping are widespread.</p>", "https://x/mx"),
        )]);
        let rec = &fuse(&registry, &advisories, &PresetMap::empty(), tables())["MX"];
        assert_eq!(rec.overall_risk, OverallRisk::Medium);
        assert_eq!(rec.risk_scores.values(), [3, 3, 2, 3]);
        assert_eq!(rec.top_risks, vec!["violent or petty crime", "kidnapping risk"]);
        assert_eq!(rec.advisory_excerpt, "violent crime and kidnapping are widespread.");
        assert_eq!(rec.advisory_link, "https://x/mx");
        assert!(rec.is_core_country);
    }

    #[test]
    fn test_advisory_beats_preset_level() {
        let registry = vec![country("FR", "France", "Europe")];
        let advisories = index(vec![("FR", advisory(4, "", ""))]);
        let presets = PresetMap::from_presets([(
            "FR".to_string(),
            Preset {
                overall_risk: Some(OverallRisk::Low),
                ..Default::default()
            },
        )])
        .unwrap();
        let rec = &fuse(&registry, &advisories, &presets, tables())["FR"];
        assert_eq!(rec.overall_risk, OverallRisk::High);
        assert_eq!(rec.risk_scores.values(), [4, 4, 3, 3]);
    }

    #[test]
    fn test_preset_level_without_advisory() {
        let registry = vec![country("FR", "France", "Europe")];
        let presets = PresetMap::from_presets([(
            "FR".to_string(),
            Preset {
                overall_risk: Some(OverallRisk::Low),
                risk_scores: Some(PartialRiskScores {
                    crime: Some(4),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )])
        .unwrap();
        let rec = &fuse(&registry, &AdvisoryIndex::default(), &presets, tables())["FR"];
        assert_eq!(rec.overall_risk, OverallRisk::Low);
        assert_eq!(rec.risk_scores.values(), [4, 2, 2, 2]);
    }

    #[test]
    fn test_preset_fields_win() {
        let registry = vec![country("IT", "Italy", "")];
        let advisories = index(vec![("IT", advisory(2, "<p>Terrorism.</p>", "https://live/it"))]);
        let presets = PresetMap::from_presets([(
            "IT".to_string(),
            Preset {
                top_risks: Some(vec!["pickpockets".into()]),
                advisory_excerpt: Some("curated".into()),
                advisory_link: Some("https://curated/it".into()),
                mindset_tip: Some("relax".into()),
                region: Some("Europe".into()),
                ..Default::default()
            },
        )])
        .unwrap();
        let rec = &fuse(&registry, &advisories, &presets, tables())["IT"];
        assert_eq!(rec.top_risks, vec!["pickpockets"]);
        assert_eq!(rec.advisory_excerpt, "curated");
        assert_eq!(rec.advisory_link, "https://curated/it");
        assert_eq!(rec.mindset_tip, "relax");
        assert_eq!(rec.region, "Europe");
        assert_eq!(rec.emergency_contacts, tables().defaults().emergency_contacts);
    }

    #[test]
    fn test_registry_region_beats_preset() {
        let registry = vec![country("IT", "Italy", "Europe")];
        let presets = PresetMap::from_presets([(
            "IT".to_string(),
            Preset {
                region: Some("Elsewhere".into()),
                ..Default::default()
            },
        )])
        .unwrap();
        let rec = &fuse(&registry, &AdvisoryIndex::default(), &presets, tables())["IT"];
        assert_eq!(rec.region, "Europe");
    }

    #[test]
    fn test_embedded_presets_apply() {
        let registry = vec![country("JP", "Japan", "Asia")];
        let rec = &fuse(&registry, &AdvisoryIndex::default(), PresetMap::embedded(), tables())["JP"];
        assert!(rec.playbook.contains_key("earthquake"));
        assert_eq!(rec.emergency_contacts.police, "110");
    }

    fn arb_level() -> impl Strategy<Value = Option<u8>> {
        prop_oneof![Just(None), (1u8..=4).prop_map(Some)]
    }

    fn arb_partial() -> impl Strategy<Value = Option<PartialRiskScores>> {
        let score = proptest::option::of(1u8..=5);
        proptest::option::of((score.clone(), score.clone(), score.clone(), score).prop_map(
            |(crime, political, health, natural_disaster)| PartialRiskScores {
                crime,
                political,
                health,
                natural_disaster,
            },
        ))
    }

    proptest! {
        #[test]
        fn prop_fused_records_are_well_formed(
            levels in proptest::collection::vec(arb_level(), 1..30),
            partial in arb_partial(),
            summary in "[a-z ]{0,80}",
        ) {
            let registry: Vec<CountryRecord> = (0..levels.len())
                .map(|i| country(&format!("C{i}"), &format!("Country {i}"), "R"))
                .collect();
            let advisories = index(
                levels
                    .iter()
                    .enumerate()
                    .filter_map(|(i, l)| l.map(|l| (i, l)))
                    .map(|(i, l)| (registry[i].code.as_str(), advisory(l, &summary, "")))
                    .collect(),
            );
            let presets = PresetMap::from_presets([(
                "C0".to_string(),
                Preset { risk_scores: partial, ..Default::default() },
            )])
            .unwrap();

            let fused = fuse(&registry, &advisories, &presets, tables());
            prop_assert_eq!(fused.len(), registry.len());
            for rec in fused.values() {
                prop_assert!(rec
                    .risk_scores
                    .values()
                    .iter()
                    .all(|v| (RiskScores::MIN..=RiskScores::MAX).contains(v)));
                prop_assert!(rec.top_risks.len() <= 3 && !rec.top_risks.is_empty());
                let mut unique = rec.top_risks.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), rec.top_risks.len());
            }
        }
    }
}
