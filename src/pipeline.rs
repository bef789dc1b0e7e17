//! The two batch runs: the per-country safety map, and the extended
//! analysis that scores and tiers every country.

use crate::advisory::build_advisory_index;
use crate::composite::{self, AnalysisRow, AnalysisSummary, FeatureSources};
use crate::config::Config;
use crate::error::{Result, SafetyError};
use crate::fusion::fuse;
use crate::guidance::Guide;
use crate::homicide;
use crate::model::RiskRecord;
use crate::ranking::{self, RankingRow};
use crate::resolver::{index_by_code, Resolver, Unmatched};
use crate::sources::{degrade, DataSource, LiveSources};
use crate::store;
use crate::tables::{PresetMap, ReferenceTables};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SafetyReport {
    pub records: BTreeMap<String, RiskRecord>,
    pub advisory_unmatched: Unmatched,
}

/// Registry, advisories and presets fused into one record per country.
/// Unreachable sources shrink the result instead of failing it.
pub fn build_country_safety(
    src: &dyn DataSource,
    tables: &ReferenceTables,
    presets: &PresetMap,
) -> Result<SafetyReport> {
    let registry = degrade("registry", src.registry(), Vec::new())?;
    let items = degrade("advisories", src.advisories(), Vec::new())?;

    let resolver = Resolver::new(&registry, tables.aliases());
    let advisories = build_advisory_index(&items, &resolver);
    let records = fuse(&registry, &advisories, presets, tables);

    Ok(SafetyReport {
        records,
        advisory_unmatched: advisories.unmatched,
    })
}

/// Knobs for [`run_full_analysis`].
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub k: usize,
    pub seed: u64,
    pub gpi_cache: Option<PathBuf>,
}

impl From<&Config> for AnalysisOptions {
    fn from(config: &Config) -> Self {
        Self {
            k: config.analysis.k,
            seed: config.analysis.seed,
            gpi_cache: config.analysis.gpi_cache.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub rows: Vec<AnalysisRow>,
    pub summary: AnalysisSummary,
    pub homicide_unmatched: Unmatched,
    pub peace_unmatched: Unmatched,
    pub advisory_unmatched: Unmatched,
}

/// Score and tier every registry country.
///
/// Advisory levels come from the live feed, with rows of the manual table
/// taking precedence. `risk_map` feeds `mean_crime_score` in the summary.
/// Fails only when the ranking table comes out short.
pub fn run_full_analysis(
    src: &dyn DataSource,
    tables: &ReferenceTables,
    options: &AnalysisOptions,
    risk_map: Option<&BTreeMap<String, RiskRecord>>,
) -> Result<AnalysisReport> {
    let registry = degrade("registry", src.registry(), Vec::new())?;
    let resolver = Resolver::new(&registry, tables.aliases());

    let html = degrade("homicide", src.homicide_html(), String::new())?;
    let homicide_rows = if html.is_empty() {
        Vec::new()
    } else {
        homicide::extract_rates(&html)
    };
    let (homicide, homicide_unmatched) = index_by_code(
        homicide_rows.into_iter().map(|r| (r.country, r.rate)),
        &resolver,
        "homicide",
    );

    let peace_rows = degrade(
        "gpi_pdf",
        ranking::load_or_extract(options.gpi_cache.as_deref(), || src.ranking_document()),
        Vec::new(),
    )?;
    let (peace, peace_unmatched) = index_by_code(
        peace_rows.into_iter().map(|r: RankingRow| (r.country.clone(), r)),
        &resolver,
        "gpi",
    );

    let items = degrade("advisories", src.advisories(), Vec::new())?;
    let advisory_index = build_advisory_index(&items, &resolver);
    let mut advisory_levels = advisory_index.levels();
    if let Some(manual) = degrade("manual_advisories", src.manual_advisories(), None)? {
        info!("Applying {} manual advisory levels", manual.len());
        advisory_levels.extend(manual);
    }

    let sources = FeatureSources {
        homicide,
        peace,
        advisory_levels,
    };
    let rows = composite::score_countries(&registry, &sources, options.k, options.seed);
    let summary = composite::summarize(&rows, risk_map);

    Ok(AnalysisReport {
        rows,
        summary,
        homicide_unmatched,
        peace_unmatched,
        advisory_unmatched: advisory_index.unmatched,
    })
}

fn load_presets(config: &Config) -> Result<PresetMap> {
    match &config.presets {
        Some(path) => PresetMap::load(path),
        None => Ok(PresetMap::embedded().clone()),
    }
}

/// Build the safety map from live sources and write it out.
pub fn run_safety(config: &Config) -> Result<SafetyReport> {
    let tables = ReferenceTables::embedded();
    let presets = load_presets(config)?;
    let src = LiveSources::new(config)?;

    let report = build_country_safety(&src, tables, &presets)?;
    store::write_json_pretty(&config.output.safety_json, &report.records)?;
    info!(
        "Wrote safety data for {} countries to {:?}",
        report.records.len(),
        config.output.safety_json
    );
    Ok(report)
}

/// Run the analysis from live sources, write the rows and summary, and log
/// the safest countries.
pub fn run_analysis(config: &Config) -> Result<AnalysisReport> {
    let tables = ReferenceTables::embedded();
    let src = LiveSources::new(config)?;

    let risk_map = if config.output.safety_json.is_file() {
        match store::read_risk_map(&config.output.safety_json) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!("Could not read {:?}: {}", config.output.safety_json, e);
                None
            }
        }
    } else {
        None
    };

    let report = run_full_analysis(&src, tables, &AnalysisOptions::from(config), risk_map.as_ref())?;
    store::write_csv(&config.output.analysis_csv, &report.rows)?;
    if let Err(e) = store::write_json_pretty(&config.output.summary_json, &report.summary) {
        warn!("Could not write summary {:?}: {}", config.output.summary_json, e);
    }

    info!("Top {} safest countries by TSI:", config.analysis.top_n);
    for row in composite::top_by_tsi(&report.rows, config.analysis.top_n) {
        info!("  {:6.2} | {:32} | {}", row.tsi, row.name, row.risk_tier);
    }
    Ok(report)
}

/// Guidance for one country from a previously written safety map.
pub fn guide(config: &Config, code: &str, description: &str) -> Result<String> {
    let map = store::read_risk_map(&config.output.safety_json)?;
    let code = code.trim().to_uppercase();
    let record = map
        .get(&code)
        .ok_or_else(|| SafetyError::Config(format!("no safety record for {code}")))?;
    let guide = Guide::new(ReferenceTables::embedded())?;
    Ok(guide.compose(record, description))
}
