//! Python entry points for the analysis notebooks and scripts.
//!
//! Thin wrappers; all logic lives in the library modules.

use crate::composite;
use crate::model::CountryRecord;
use crate::tables::ReferenceTables;
use crate::{advisory, normalize, resolver, tagger};
use pyo3::prelude::*;
use pyo3::types::PyList;

/// Matchable key for a free-text country name.
#[pyfunction]
pub fn normalize_name(name: &str) -> String {
    normalize::normalize(name)
}

/// Parse an advisory title.
///
/// Returns (country_name, level, overall_risk, raw_level_text) or None.
#[pyfunction]
pub fn parse_advisory_title(title: &str) -> Option<(String, u8, String, String)> {
    advisory::parse_title(title).map(|p| {
        (
            p.country_name,
            p.level,
            p.overall.as_str().to_string(),
            p.raw_level_text,
        )
    })
}

/// Up to three risk labels from advisory summary HTML.
#[pyfunction]
pub fn extract_top_risks(py: Python<'_>, summary_html: &str) -> PyResult<Py<PyList>> {
    let tags = tagger::tag(summary_html, ReferenceTables::embedded().keywords());
    Ok(PyList::new_bound(py, tags).unbind())
}

#[pyfunction]
pub fn advisory_excerpt(summary_html: &str) -> String {
    tagger::excerpt(summary_html)
}

/// Resolve a name against a registry given as (code, name) pairs.
#[pyfunction]
pub fn resolve_country(name: &str, registry: Vec<(String, String)>) -> Option<String> {
    let countries: Vec<CountryRecord> = registry
        .into_iter()
        .map(|(code, name)| CountryRecord {
            code: code.to_uppercase(),
            name,
            region: String::new(),
            subregion: String::new(),
            population: None,
            capital: "N/A".to_string(),
        })
        .collect();
    resolver::Resolver::new(&countries, ReferenceTables::embedded().aliases())
        .resolve_name(name)
        .map(|r| r.code)
}

/// Advisory level (1-4, or None) to its 0-100 safety score.
#[pyfunction]
#[pyo3(signature = (level=None))]
pub fn advisory_score(level: Option<u8>) -> f64 {
    composite::advisory_score(level)
}

/// Weighted Travel Safety Index from the three normalized features.
#[pyfunction]
pub fn travel_safety_index(homicide_norm: f64, gpi_norm: f64, advisory_norm: f64) -> f64 {
    composite::blend(homicide_norm, gpi_norm, advisory_norm)
}
