//! Run configuration: where each source lives, where outputs go, and the
//! clustering knobs. Every field has a default, so an empty file (or no
//! file) is a valid configuration.

use crate::error::{Result, SafetyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

pub const REGISTRY_URL: &str =
    "https://restcountries.com/v3.1/all?fields=name,cca2,region,subregion,population,capital";
pub const ADVISORIES_URL: &str = "https://cadataapi.state.gov/api/TravelAdvisories";
pub const HOMICIDE_URL: &str = "https://en.wikipedia.org/wiki/List_of_countries_by_intentional_homicide_rate";

/// A remote document or a local file. Strings with an `http` or `https`
/// scheme are URLs; anything else is a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    Url(Url),
    File(PathBuf),
}

impl Source {
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(url),
            _ => Self::File(PathBuf::from(raw)),
        }
    }
}

impl From<String> for Source {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.to_string()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub registry: Source,
    pub advisories: Source,
    pub homicide: Source,
    /// Global Peace Index report (PDF)
    pub gpi_pdf: Source,
    /// Hand-maintained advisory levels; unused when absent
    pub manual_advisories: Option<Source>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            registry: Source::parse(REGISTRY_URL),
            advisories: Source::parse(ADVISORIES_URL),
            homicide: Source::parse(HOMICIDE_URL),
            gpi_pdf: Source::File(PathBuf::from("Global-Peace-Index-2025-web.pdf")),
            manual_advisories: Some(Source::File(PathBuf::from("us_advisories_manual.csv"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub safety_json: PathBuf,
    pub analysis_csv: PathBuf,
    pub summary_json: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            safety_json: PathBuf::from("data/processed.json"),
            analysis_csv: PathBuf::from("results/TravelSafe_Final_Analysis.csv"),
            summary_json: PathBuf::from("results/analysis_summary.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("travelsafe/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Extracted ranking table; skipped entirely when unset
    pub gpi_cache: Option<PathBuf>,
    /// Number of clusters, 1 to 4 (one per tier)
    pub k: usize,
    pub seed: u64,
    /// Rows shown in the closing report
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            gpi_cache: Some(PathBuf::from("gpi_2025_extracted.csv")),
            k: 4,
            seed: 42,
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sources: SourceConfig,
    pub output: OutputConfig,
    pub http: HttpConfig,
    pub analysis: AnalysisConfig,
    /// Preset file replacing the embedded presets
    pub presets: Option<PathBuf>,
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading config from {:?}", path);
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// The file at `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(1..=4).contains(&self.analysis.k) {
            return Err(SafetyError::Config(format!(
                "analysis.k must be between 1 and 4, got {}",
                self.analysis.k
            )));
        }
        if self.http.timeout_secs == 0 {
            return Err(SafetyError::Config("http.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}
