//! Scenario guidance: turns a traveller's free-text description into a
//! short paragraph built from the country's playbook.

use crate::error::{Result, SafetyError};
use crate::model::{RiskRecord, Scenario};
use crate::tables::{ReferenceTables, ScenarioCue};
use regex::Regex;
use tracing::debug;

const DEFAULT_LAST_STEP: &str =
    "move to a busier, well-lit place and consider calling local emergency services or your embassy for support.";

struct CompiledCue {
    pattern: Regex,
    scenarios: Vec<String>,
}

/// Cue families in table order. The first family whose pattern matches the
/// description decides the scenario, even when the playbook has none of its
/// keys.
pub struct Guide {
    cues: Vec<CompiledCue>,
}

/// A matched playbook entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioMatch<'a> {
    pub key: &'a str,
    pub scenario: &'a Scenario,
}

impl Guide {
    pub fn new(tables: &ReferenceTables) -> Result<Self> {
        Self::from_cues(tables.scenario_cues())
    }

    pub fn from_cues(cues: &[ScenarioCue]) -> Result<Self> {
        let cues = cues
            .iter()
            .map(|cue| {
                let pattern = Regex::new(&cue.pattern).map_err(|e| {
                    SafetyError::Config(format!("bad scenario cue {:?}: {}", cue.pattern, e))
                })?;
                Ok(CompiledCue {
                    pattern,
                    scenarios: cue.scenarios.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { cues })
    }

    /// Pick the playbook scenario for a description, if any.
    pub fn select<'a>(&self, record: &'a RiskRecord, description: &str) -> Option<ScenarioMatch<'a>> {
        let text = description.to_lowercase();
        let cue = self.cues.iter().find(|c| c.pattern.is_match(&text))?;
        let found = cue.scenarios.iter().find_map(|key| {
            record
                .playbook
                .get_key_value(key.as_str())
                .map(|(key, scenario)| ScenarioMatch { key, scenario })
        });
        debug!(
            "Cue {:?} for {} selected {:?}",
            cue.pattern.as_str(),
            record.code,
            found.as_ref().map(|m| m.key)
        );
        found
    }

    /// Guidance paragraph for a description. Falls back to generic advice
    /// when no playbook scenario applies.
    pub fn compose(&self, record: &RiskRecord, description: &str) -> String {
        match self.select(record, description) {
            Some(found) => scenario_paragraph(&record.name, found.scenario),
            None => generic_paragraph(&record.name),
        }
    }
}

fn scenario_paragraph(country: &str, scenario: &Scenario) -> String {
    let step = |i: usize| scenario.steps.get(i).map(String::as_str).unwrap_or_default();
    let last = scenario
        .steps
        .get(2)
        .map(String::as_str)
        .unwrap_or(DEFAULT_LAST_STEP);
    format!(
        "You're in {country}, and it sounds like you're going through a situation similar to \"{label}\". \
         First, {first} Then, {second} If you still feel unsafe or unsure after these first steps, {last} \
         Remember you don't need to solve everything at once. One safe next step at a time is enough.",
        label = scenario.label,
        first = step(0),
        second = step(1),
    )
}

fn generic_paragraph(country: &str) -> String {
    format!(
        "Thanks for explaining what's happening. Because this situation doesn't match one of the preset \
         scenarios for {country}, start with the basics: move to a place that feels physically safe, make \
         sure your phone has enough battery, and let at least one trusted person know where you are. If you \
         feel in immediate danger, contact local emergency services or head into a hotel, cafe, or public \
         transport hub to ask for help. You can also keep notes of time, place, and people involved for any \
         later reports or insurance claims."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::AdvisoryIndex;
    use crate::fusion::fuse;
    use crate::model::CountryRecord;
    use crate::tables::PresetMap;

    fn record(code: &str, name: &str) -> RiskRecord {
        let registry = vec![CountryRecord {
            code: code.to_string(),
            name: name.to_string(),
            region: "R".into(),
            subregion: String::new(),
            population: None,
            capital: "N/A".into(),
        }];
        fuse(
            &registry,
            &AdvisoryIndex::default(),
            PresetMap::embedded(),
            ReferenceTables::embedded(),
        )
        .remove(code)
        .unwrap()
    }

    fn guide() -> Guide {
        Guide::new(ReferenceTables::embedded()).unwrap()
    }

    #[test]
    fn test_passport_prefers_lost_passport() {
        let jp = record("JP", "Japan");
        let found = guide().select(&jp, "I lost my PASSPORT at the station").unwrap();
        assert_eq!(found.key, "lost_passport");
    }

    #[test]
    fn test_passport_falls_back_to_theft() {
        let fr = record("FR", "France");
        let found = guide().select(&fr, "my passport is gone").unwrap();
        assert_eq!(found.key, "theft");
    }

    #[test]
    fn test_theft_falls_back_to_passport() {
        let jp = record("JP", "Japan");
        let found = guide().select(&jp, "someone robbed me").unwrap();
        assert_eq!(found.key, "lost_passport");
    }

    #[test]
    fn test_first_cue_family_decides() {
        // "strike" is a protest cue; Italy has no protest scenario, so the
        // heat cue later in the table is never consulted.
        let it = record("IT", "Italy");
        assert_eq!(guide().select(&it, "a transport strike in the heat"), None);
    }

    #[test]
    fn test_compose_scenario_paragraph() {
        let jp = record("JP", "Japan");
        let text = guide().compose(&jp, "there was a strong earthquake");
        assert!(text.starts_with("You're in Japan"));
        let scenario = &jp.playbook["earthquake"];
        assert!(text.contains(&scenario.label));
        assert!(text.contains(&scenario.steps[0]));
    }

    #[test]
    fn test_compose_generic_without_playbook() {
        let zz = record("ZZ", "Zedland");
        let text = guide().compose(&zz, "my bag was stolen");
        assert!(text.starts_with("Thanks for explaining"));
        assert!(text.contains("Zedland"));
    }

    #[test]
    fn test_short_playbook_uses_default_last_step() {
        let scenario = Scenario {
            label: "Flood".into(),
            steps: vec!["go uphill.".into()],
        };
        let text = scenario_paragraph("Testland", &scenario);
        assert!(text.contains(DEFAULT_LAST_STEP));
    }

    #[test]
    fn test_bad_cue_rejected() {
        let cues = vec![ScenarioCue {
            pattern: "(unclosed".into(),
            scenarios: vec![],
        }];
        assert!(Guide::from_cues(&cues).is_err());
    }
}
