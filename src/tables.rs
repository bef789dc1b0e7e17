//! Reference tables: alias names, risk keywords, the core tourism set,
//! generic defaults and preset overrides.
//!
//! The tables ship as TOML under `config/` and are parsed once into
//! immutable structures. Presets can be swapped for a user file at start-up.

use crate::error::{Result, SafetyError};
use crate::model::{EmergencyContacts, Preset, RiskScores};
use crate::normalize::normalize;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

const REFERENCE_TOML: &str = include_str!("../config/reference.toml");
const PRESETS_TOML: &str = include_str!("../config/presets.toml");

static REFERENCE: Lazy<ReferenceTables> = Lazy::new(|| {
    ReferenceTables::from_toml(REFERENCE_TOML).expect("embedded reference.toml is valid")
});

static EMBEDDED_PRESETS: Lazy<PresetMap> = Lazy::new(|| {
    PresetMap::from_toml(PRESETS_TOML).expect("embedded presets.toml is valid")
});

/// Alternate name (normalized) to canonical code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Alias {
    pub name: String,
    pub code: String,
}

/// Keyword and the risk label it contributes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordLabel {
    pub keyword: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoreRegion {
    pub name: String,
    pub codes: Vec<String>,
}

/// Values used for every country a preset does not cover.
#[derive(Debug, Clone, Deserialize)]
pub struct Defaults {
    pub top_risks: Vec<String>,
    pub mindset_tip: String,
    pub emergency_contacts: EmergencyContacts,
}

/// A family of free-text cues and the playbook keys it maps to.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCue {
    pub pattern: String,
    pub scenarios: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawReference {
    alias: Vec<Alias>,
    keyword: Vec<KeywordLabel>,
    core_region: Vec<CoreRegion>,
    defaults: Defaults,
    #[serde(default)]
    scenario_cue: Vec<ScenarioCue>,
}

#[derive(Debug, Clone)]
pub struct ReferenceTables {
    aliases: Vec<Alias>,
    keywords: Vec<KeywordLabel>,
    core_regions: Vec<CoreRegion>,
    core_codes: HashSet<String>,
    defaults: Defaults,
    scenario_cues: Vec<ScenarioCue>,
}

impl ReferenceTables {
    /// The tables compiled into the crate.
    pub fn embedded() -> &'static ReferenceTables {
        &REFERENCE
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let parsed: RawReference = toml::from_str(raw)?;

        // Alias keys are compared against normalized names, so store them
        // normalized; keep the first entry for a repeated key.
        let mut seen = HashSet::new();
        let aliases = parsed
            .alias
            .into_iter()
            .map(|a| Alias {
                name: normalize(&a.name),
                code: a.code.trim().to_uppercase(),
            })
            .filter(|a| !a.name.is_empty() && seen.insert(a.name.clone()))
            .collect();

        let keywords = parsed
            .keyword
            .into_iter()
            .map(|k| KeywordLabel {
                keyword: k.keyword.to_lowercase(),
                label: k.label,
            })
            .collect();

        let core_codes = parsed
            .core_region
            .iter()
            .flat_map(|r| r.codes.iter().map(|c| c.trim().to_uppercase()))
            .collect();

        if parsed.defaults.top_risks.is_empty() || parsed.defaults.top_risks.len() > 3 {
            return Err(SafetyError::Config(
                "defaults.top_risks must hold 1 to 3 entries".into(),
            ));
        }

        Ok(Self {
            aliases,
            keywords,
            core_regions: parsed.core_region,
            core_codes,
            defaults: parsed.defaults,
            scenario_cues: parsed.scenario_cue,
        })
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    pub fn keywords(&self) -> &[KeywordLabel] {
        &self.keywords
    }

    pub fn core_regions(&self) -> &[CoreRegion] {
        &self.core_regions
    }

    pub fn is_core_country(&self, code: &str) -> bool {
        self.core_codes.contains(code)
    }

    pub fn core_country_count(&self) -> usize {
        self.core_codes.len()
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn scenario_cues(&self) -> &[ScenarioCue] {
        &self.scenario_cues
    }
}

/// Country code to preset override.
#[derive(Debug, Clone, Default)]
pub struct PresetMap {
    presets: BTreeMap<String, Preset>,
}

impl PresetMap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The curated presets compiled into the crate.
    pub fn embedded() -> &'static PresetMap {
        &EMBEDDED_PRESETS
    }

    /// Load a user preset file in place of the embedded one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading presets from {:?}", path);
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let parsed: BTreeMap<String, Preset> = toml::from_str(raw)?;
        let presets = parsed
            .into_iter()
            .map(|(code, preset)| (code.trim().to_uppercase(), preset))
            .collect();
        let map = Self { presets };
        map.validate()?;
        Ok(map)
    }

    pub fn from_presets(presets: impl IntoIterator<Item = (String, Preset)>) -> Result<Self> {
        let map = Self {
            presets: presets
                .into_iter()
                .map(|(code, p)| (code.to_uppercase(), p))
                .collect(),
        };
        map.validate()?;
        Ok(map)
    }

    fn validate(&self) -> Result<()> {
        for (code, preset) in &self.presets {
            if let Some(scores) = &preset.risk_scores {
                for value in scores.values().into_iter().flatten() {
                    if !(RiskScores::MIN..=RiskScores::MAX).contains(&value) {
                        return Err(SafetyError::InvalidPreset {
                            code: code.clone(),
                            reason: format!("risk score {value} outside 1-5"),
                        });
                    }
                }
            }
            if let Some(risks) = &preset.top_risks {
                let unique: HashSet<&String> = risks.iter().collect();
                if risks.len() > 3 || unique.len() != risks.len() {
                    return Err(SafetyError::InvalidPreset {
                        code: code.clone(),
                        reason: "top_risks must be at most 3 distinct entries".into(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&Preset> {
        self.presets.get(code)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
