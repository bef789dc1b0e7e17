//! Country identity resolution and travel-risk fusion for the TravelSafe
//! dataset.
//!
//! Joins four kinds of source on one canonical country code:
//! 1. REST Countries registry (ISO codes, the row set)
//! 2. US travel advisories (free-text titles and HTML summaries)
//! 3. Intentional homicide rates (scraped HTML table)
//! 4. Global Peace Index ranking (report page text)
//!
//! [`pipeline::build_country_safety`] fuses advisories and curated presets
//! into one [`model::RiskRecord`] per country. [`pipeline::run_full_analysis`]
//! blends all sources into the Travel Safety Index and tiers countries by
//! k-means.

pub mod advisory;
pub mod cluster;
pub mod composite;
pub mod config;
pub mod error;
pub mod fusion;
pub mod guidance;
pub mod homicide;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod ranking;
pub mod resolver;
pub mod sources;
pub mod store;
pub mod tables;
pub mod tagger;

#[cfg(feature = "python")]
mod python;

pub use error::{Result, SafetyError};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// TravelSafe core: native helpers for the Python analysis scripts.
#[cfg(feature = "python")]
#[pymodule]
fn travelsafe_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Names and identity
    m.add_function(wrap_pyfunction!(python::normalize_name, m)?)?;
    m.add_function(wrap_pyfunction!(python::resolve_country, m)?)?;

    // Advisories
    m.add_function(wrap_pyfunction!(python::parse_advisory_title, m)?)?;
    m.add_function(wrap_pyfunction!(python::extract_top_risks, m)?)?;
    m.add_function(wrap_pyfunction!(python::advisory_excerpt, m)?)?;

    // Scoring
    m.add_function(wrap_pyfunction!(python::advisory_score, m)?)?;
    m.add_function(wrap_pyfunction!(python::travel_safety_index, m)?)?;

    Ok(())
}
