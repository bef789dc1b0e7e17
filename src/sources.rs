//! Raw data sources behind one trait, so the pipelines run the same against
//! live endpoints and in-memory fixtures.

use crate::advisory::AdvisoryItem;
use crate::config::{Config, Source, SourceConfig};
use crate::error::{Result, SafetyError};
use crate::model::CountryRecord;
use crate::ranking::RankingDocument;
use crate::store;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Everything the pipelines read. Each call is independent and blocking.
pub trait DataSource {
    fn registry(&self) -> Result<Vec<CountryRecord>>;
    fn advisories(&self) -> Result<Vec<AdvisoryItem>>;
    fn homicide_html(&self) -> Result<String>;
    fn ranking_document(&self) -> Result<RankingDocument>;
    /// `None` when no manual table is configured or present.
    fn manual_advisories(&self) -> Result<Option<BTreeMap<String, u8>>>;
}

#[derive(Debug, Deserialize)]
struct RawName {
    #[serde(default)]
    common: String,
}

#[derive(Debug, Deserialize)]
struct RawCountry {
    cca2: Option<String>,
    name: Option<RawName>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    subregion: Option<String>,
    population: Option<u64>,
    #[serde(default)]
    capital: Option<Vec<String>>,
}

/// Parse the REST Countries payload. Entries without `cca2` are skipped and
/// the first entry per code is kept.
pub fn parse_registry(json: &str) -> Result<Vec<CountryRecord>> {
    let raw: Vec<RawCountry> = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    let countries: Vec<CountryRecord> = raw
        .into_iter()
        .filter_map(|c| {
            let code = c.cca2?.trim().to_uppercase();
            if code.is_empty() || !seen.insert(code.clone()) {
                return None;
            }
            Some(CountryRecord {
                code,
                name: c.name.map(|n| n.common).unwrap_or_default(),
                region: c.region.unwrap_or_default(),
                subregion: c.subregion.unwrap_or_default(),
                population: c.population,
                capital: c
                    .capital
                    .and_then(|caps| caps.into_iter().next())
                    .unwrap_or_else(|| "N/A".to_string()),
            })
        })
        .collect();
    info!("Got {} countries from the registry", countries.len());
    Ok(countries)
}

/// HTTP endpoints and local files named in the config.
pub struct LiveSources {
    sources: SourceConfig,
    client: reqwest::blocking::Client,
}

impl LiveSources {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.http.timeout())
            .user_agent(config.http.user_agent.clone())
            .build()?;
        Ok(Self {
            sources: config.sources.clone(),
            client,
        })
    }

    fn fetch_bytes(&self, name: &str, source: &Source) -> Result<Vec<u8>> {
        debug!("Fetching {} from {}", name, source);
        match source {
            Source::Url(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| SafetyError::unavailable(name, e))?;
                let body = response.bytes().map_err(|e| SafetyError::unavailable(name, e))?;
                Ok(body.to_vec())
            }
            Source::File(path) => std::fs::read(path)
                .map_err(|e| SafetyError::unavailable(name, format!("{}: {}", path.display(), e))),
        }
    }

    fn fetch_text(&self, name: &str, source: &Source) -> Result<String> {
        let bytes = self.fetch_bytes(name, source)?;
        String::from_utf8(bytes).map_err(|e| SafetyError::unavailable(name, e))
    }
}

fn is_plain_text(source: &Source) -> bool {
    match source {
        Source::File(path) => path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")),
        Source::Url(url) => url.path().ends_with(".txt"),
    }
}

/// Run Poppler's `pdftotext` over PDF bytes; pages come back separated by
/// form feeds.
fn pdf_to_text(pdf: &[u8]) -> Result<String> {
    pipe_through("pdftotext", &["-enc", "UTF-8", "-", "-"], pdf)
}

/// Feed `input` to a filter program and collect its stdout. The child is
/// always reaped, even when it stops reading early.
fn pipe_through(program: &str, args: &[&str], input: &[u8]) -> Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SafetyError::unavailable("gpi_pdf", format!("{program}: {e}")))?;

    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(input),
        None => Ok(()),
    };
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(SafetyError::unavailable(
            "gpi_pdf",
            format!("{program} failed: {}", String::from_utf8_lossy(&output.stderr).trim()),
        ));
    }
    written.map_err(|e| SafetyError::unavailable("gpi_pdf", format!("{program} stopped reading input: {e}")))?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl DataSource for LiveSources {
    fn registry(&self) -> Result<Vec<CountryRecord>> {
        let body = self.fetch_text("registry", &self.sources.registry)?;
        parse_registry(&body)
    }

    fn advisories(&self) -> Result<Vec<AdvisoryItem>> {
        let body = self.fetch_text("advisories", &self.sources.advisories)?;
        let items: Vec<AdvisoryItem> =
            serde_json::from_str(&body).map_err(|e| SafetyError::unavailable("advisories", e))?;
        info!("Got {} advisory records", items.len());
        Ok(items)
    }

    fn homicide_html(&self) -> Result<String> {
        self.fetch_text("homicide", &self.sources.homicide)
    }

    /// `.txt` sources are taken as already-extracted text.
    fn ranking_document(&self) -> Result<RankingDocument> {
        let source = &self.sources.gpi_pdf;
        let text = if is_plain_text(source) {
            self.fetch_text("gpi_pdf", source)?
        } else {
            pdf_to_text(&self.fetch_bytes("gpi_pdf", source)?)?
        };
        let doc = RankingDocument::from_form_feed_text(&text);
        debug!("Ranking document has {} pages", doc.pages().len());
        Ok(doc)
    }

    fn manual_advisories(&self) -> Result<Option<BTreeMap<String, u8>>> {
        let Some(source) = &self.sources.manual_advisories else {
            return Ok(None);
        };
        if let Source::File(path) = source {
            if !path.exists() {
                debug!("No manual advisory table at {:?}", path);
                return Ok(None);
            }
        }
        let body = self.fetch_bytes("manual_advisories", source)?;
        let levels = store::read_manual_advisories(body.as_slice())?;
        info!("Loaded {} manual advisory levels", levels.len());
        Ok(Some(levels))
    }
}

/// Fixed in-memory data. A field left `None` behaves like an unreachable
/// source.
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    pub registry: Option<Vec<CountryRecord>>,
    pub advisories: Option<Vec<AdvisoryItem>>,
    pub homicide_html: Option<String>,
    pub ranking_pages: Option<Vec<String>>,
    pub manual_advisories: Option<BTreeMap<String, u8>>,
}

impl DataSource for MemorySources {
    fn registry(&self) -> Result<Vec<CountryRecord>> {
        self.registry
            .clone()
            .ok_or_else(|| SafetyError::unavailable("registry", "not provided"))
    }

    fn advisories(&self) -> Result<Vec<AdvisoryItem>> {
        self.advisories
            .clone()
            .ok_or_else(|| SafetyError::unavailable("advisories", "not provided"))
    }

    fn homicide_html(&self) -> Result<String> {
        self.homicide_html
            .clone()
            .ok_or_else(|| SafetyError::unavailable("homicide", "not provided"))
    }

    fn ranking_document(&self) -> Result<RankingDocument> {
        self.ranking_pages
            .clone()
            .map(RankingDocument::from_pages)
            .ok_or_else(|| SafetyError::unavailable("gpi_pdf", "not provided"))
    }

    fn manual_advisories(&self) -> Result<Option<BTreeMap<String, u8>>> {
        Ok(self.manual_advisories.clone())
    }
}

/// Log a non-fatal source failure and fall back to `default`. Fatal errors
/// are passed through.
pub fn degrade<T>(name: &str, result: Result<T>, default: T) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("{} unavailable, continuing without it: {}", name, e);
            Ok(default)
        }
    }
}
