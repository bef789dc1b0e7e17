//! Records flowing through the pipeline, from raw registry rows to the
//! fused per-country [`RiskRecord`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One country from the registry feed. `code` is the join key for every
/// other source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    /// ISO 3166-1 alpha-2, upper case
    pub code: String,
    pub name: String,
    pub region: String,
    pub subregion: String,
    pub population: Option<u64>,
    /// First listed capital, `"N/A"` when the registry has none
    pub capital: String,
}

/// Coarse advisory bucket shown to travellers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallRisk {
    Low,
    Medium,
    High,
    Unknown,
}

impl OverallRisk {
    /// Map a 1-4 advisory level. Anything else has no bucket.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 | 4 => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }

    /// Baseline category scores before preset overrides.
    pub fn default_scores(&self) -> RiskScores {
        match self {
            Self::Low => RiskScores::new(2, 2, 2, 2),
            Self::Medium => RiskScores::new(3, 3, 2, 3),
            Self::High => RiskScores::new(4, 4, 3, 3),
            Self::Unknown => RiskScores::new(3, 3, 3, 3),
        }
    }
}

impl fmt::Display for OverallRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed advisory, keyed by resolved country code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    pub overall: OverallRisk,
    /// 1-4
    pub level: u8,
    /// e.g. "Level 4: Do Not Travel"
    pub raw_level_text: String,
    pub summary_html: String,
    pub link: String,
}

/// Per-category risk on a 1 (calm) to 5 (severe) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScores {
    pub crime: u8,
    pub political: u8,
    pub health: u8,
    pub natural_disaster: u8,
}

impl RiskScores {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub const fn new(crime: u8, political: u8, health: u8, natural_disaster: u8) -> Self {
        Self {
            crime,
            political,
            health,
            natural_disaster,
        }
    }

    /// Apply overrides field by field.
    pub fn overlay(mut self, partial: &PartialRiskScores) -> Self {
        if let Some(v) = partial.crime {
            self.crime = v;
        }
        if let Some(v) = partial.political {
            self.political = v;
        }
        if let Some(v) = partial.health {
            self.health = v;
        }
        if let Some(v) = partial.natural_disaster {
            self.natural_disaster = v;
        }
        self
    }

    pub fn values(&self) -> [u8; 4] {
        [self.crime, self.political, self.health, self.natural_disaster]
    }
}

/// Preset-side scores; unset categories keep the computed value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialRiskScores {
    pub crime: Option<u8>,
    pub political: Option<u8>,
    pub health: Option<u8>,
    pub natural_disaster: Option<u8>,
}

impl PartialRiskScores {
    pub fn values(&self) -> [Option<u8>; 4] {
        [self.crime, self.political, self.health, self.natural_disaster]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContacts {
    pub police: String,
    pub ambulance: String,
    pub fire: String,
    pub note: String,
}

/// One crisis scenario in a country playbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub label: String,
    pub steps: Vec<String>,
}

/// Scenario key (e.g. `"theft"`) to scenario.
pub type Playbook = BTreeMap<String, Scenario>;

/// Fused output unit, one per registry country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub code: String,
    pub name: String,
    pub region: String,
    pub subregion: String,
    pub overall_risk: OverallRisk,
    pub risk_scores: RiskScores,
    pub top_risks: Vec<String>,
    pub emergency_contacts: EmergencyContacts,
    pub mindset_tip: String,
    pub playbook: Playbook,
    pub advisory_excerpt: String,
    pub advisory_link: String,
    pub is_core_country: bool,
}

/// Manually curated overrides for one country. Every field is optional;
/// a set field wins over anything computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    pub overall_risk: Option<OverallRisk>,
    pub risk_scores: Option<PartialRiskScores>,
    pub top_risks: Option<Vec<String>>,
    pub emergency_contacts: Option<EmergencyContacts>,
    pub mindset_tip: Option<String>,
    pub playbook: Option<Playbook>,
    pub advisory_excerpt: Option<String>,
    pub advisory_link: Option<String>,
    pub region: Option<String>,
}
