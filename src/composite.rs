//! Travel Safety Index: three normalized features blended into one 0-100
//! score, then clustered into named risk tiers.
//!
//! Each feature is oriented so that 100 is safest:
//!
//! - homicide rate: median-impute, `ln(1 + x)`, min-max to 0-100, invert
//! - peace index score: median-impute, min-max to 0-100, invert
//! - advisory level: 1 → 100, 2 → 66, 3 → 33, 4 → 0, missing → 50
//!
//! `TSI = 0.4 * homicide + 0.3 * peace + 0.3 * advisory`

use crate::cluster::KMeans;
use crate::model::{CountryRecord, RiskRecord};
use crate::ranking::RankingRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

pub const HOMICIDE_WEIGHT: f64 = 0.4;
pub const PEACE_WEIGHT: f64 = 0.3;
pub const ADVISORY_WEIGHT: f64 = 0.3;

/// Score for a feature with no observed values at all.
const NEUTRAL_SCORE: f64 = 50.0;

// ── Output rows ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    Safe,
    Moderate,
    Caution,
    #[serde(rename = "High Risk")]
    HighRisk,
}

impl RiskTier {
    /// Safest first.
    pub const ORDERED: [RiskTier; 4] = [Self::Safe, Self::Moderate, Self::Caution, Self::HighRisk];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Moderate => "Moderate",
            Self::Caution => "Caution",
            Self::HighRisk => "High Risk",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flat output row per registry country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub code: String,
    pub name: String,
    pub region: String,
    pub subregion: String,
    pub population: Option<u64>,
    pub capital: String,
    pub homicide_rate: Option<f64>,
    pub gpi_score: Option<f64>,
    pub gpi_rank: Option<u32>,
    pub advisory_level: Option<u8>,
    pub homicide_norm: f64,
    pub gpi_norm: f64,
    pub advisory_norm: f64,
    pub tsi: f64,
    pub cluster: usize,
    pub risk_tier: RiskTier,
}

impl AnalysisRow {
    pub fn features(&self) -> [f64; 3] {
        [self.homicide_norm, self.gpi_norm, self.advisory_norm]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_countries: usize,
    pub countries_with_homicide_data: usize,
    pub countries_with_gpi_data: usize,
    pub countries_with_advisory_data: usize,
    pub countries_with_safety_data: usize,
    pub mean_homicide_rate: Option<f64>,
    /// Mean `risk_scores.crime` over the fused risk map, when one exists
    pub mean_crime_score: Option<f64>,
    pub regions_covered: usize,
}

// ── Feature scaling ─────────────────────────────────────────────────

/// Advisory level to its 0-100 safety score.
pub fn advisory_score(level: Option<u8>) -> f64 {
    match level {
        Some(1) => 100.0,
        Some(2) => 66.0,
        Some(3) => 33.0,
        Some(4) => 0.0,
        _ => NEUTRAL_SCORE,
    }
}

/// Median of the present values; even counts average the middle pair.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    Some(if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    })
}

/// Min-max to 0-100 and invert so the smallest input scores 100. A constant
/// column scores 100 everywhere.
fn inverted_min_max(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|v| {
            if range > 0.0 {
                100.0 - (v - min) / range * 100.0
            } else {
                100.0
            }
        })
        .collect()
}

/// Impute with the median, optionally transform, then invert-scale. Values
/// that are not finite, before or after the transform, count as missing.
/// With no observed values every row gets the neutral score.
fn normalize_feature(values: &[Option<f64>], transform: fn(f64) -> f64) -> Vec<f64> {
    let values: Vec<Option<f64>> = values
        .iter()
        .map(|v| v.filter(|x| x.is_finite() && transform(*x).is_finite()))
        .collect();
    let Some(fill) = median(&values) else {
        return vec![NEUTRAL_SCORE; values.len()];
    };
    let filled: Vec<f64> = values.iter().map(|v| transform(v.unwrap_or(fill))).collect();
    inverted_min_max(&filled)
}

pub fn blend(homicide_norm: f64, gpi_norm: f64, advisory_norm: f64) -> f64 {
    HOMICIDE_WEIGHT * homicide_norm + PEACE_WEIGHT * gpi_norm + ADVISORY_WEIGHT * advisory_norm
}

// ── Tiers ───────────────────────────────────────────────────────────

/// Name clusters by descending mean TSI: the best cluster is `Safe`, the
/// worst `High Risk`. Clusters past the fourth rank are `High Risk` too.
pub fn relabel_tiers(labels: &[usize], tsi: &[f64]) -> BTreeMap<usize, RiskTier> {
    let mut sums: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for (label, score) in labels.iter().zip(tsi) {
        let entry = sums.entry(*label).or_insert((0.0, 0));
        entry.0 += score;
        entry.1 += 1;
    }

    let mut means: Vec<(usize, f64)> = sums
        .into_iter()
        .map(|(label, (sum, n))| (label, sum / n as f64))
        .collect();
    means.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    means
        .into_iter()
        .enumerate()
        .map(|(rank, (label, mean))| {
            let tier = RiskTier::ORDERED
                .get(rank)
                .copied()
                .unwrap_or(RiskTier::HighRisk);
            debug!("Cluster {} mean TSI {:.2} → {}", label, mean, tier);
            (label, tier)
        })
        .collect()
}

/// Per-source values keyed by country code.
#[derive(Debug, Clone, Default)]
pub struct FeatureSources {
    pub homicide: BTreeMap<String, f64>,
    pub peace: BTreeMap<String, RankingRow>,
    pub advisory_levels: BTreeMap<String, u8>,
}

/// Score every registry country and assign tiers.
pub fn score_countries(
    registry: &[CountryRecord],
    sources: &FeatureSources,
    k: usize,
    seed: u64,
) -> Vec<AnalysisRow> {
    let homicide: Vec<Option<f64>> = registry
        .iter()
        .map(|c| sources.homicide.get(&c.code).copied())
        .collect();
    let peace: Vec<Option<&RankingRow>> = registry.iter().map(|c| sources.peace.get(&c.code)).collect();
    let peace_scores: Vec<Option<f64>> = peace.iter().map(|p| p.map(|r| r.score)).collect();
    let levels: Vec<Option<u8>> = registry
        .iter()
        .map(|c| sources.advisory_levels.get(&c.code).copied())
        .collect();

    let homicide_norm = normalize_feature(&homicide, f64::ln_1p);
    let gpi_norm = normalize_feature(&peace_scores, |x| x);

    let mut rows: Vec<AnalysisRow> = registry
        .iter()
        .enumerate()
        .map(|(i, country)| {
            let advisory_norm = advisory_score(levels[i]);
            AnalysisRow {
                code: country.code.clone(),
                name: country.name.clone(),
                region: country.region.clone(),
                subregion: country.subregion.clone(),
                population: country.population,
                capital: country.capital.clone(),
                homicide_rate: homicide[i],
                gpi_score: peace_scores[i],
                gpi_rank: peace[i].map(|r| r.rank),
                advisory_level: levels[i],
                homicide_norm: homicide_norm[i],
                gpi_norm: gpi_norm[i],
                advisory_norm,
                tsi: blend(homicide_norm[i], gpi_norm[i], advisory_norm),
                cluster: 0,
                risk_tier: RiskTier::Safe,
            }
        })
        .collect();

    let features: Vec<[f64; 3]> = rows.iter().map(AnalysisRow::features).collect();
    let clustering = KMeans::new(k, seed).fit(&features);
    let tsi: Vec<f64> = rows.iter().map(|r| r.tsi).collect();
    let tiers = relabel_tiers(&clustering.labels, &tsi);

    for (row, label) in rows.iter_mut().zip(&clustering.labels) {
        row.cluster = *label;
        row.risk_tier = tiers.get(label).copied().unwrap_or(RiskTier::HighRisk);
    }

    info!(
        "Scored {} countries into {} clusters (inertia {:.2})",
        rows.len(),
        clustering.centroids.len(),
        clustering.inertia
    );
    rows
}

// ── Summary ─────────────────────────────────────────────────────────

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn summarize(rows: &[AnalysisRow], risk_map: Option<&BTreeMap<String, RiskRecord>>) -> AnalysisSummary {
    let regions: BTreeSet<&str> = rows
        .iter()
        .map(|r| r.region.as_str())
        .filter(|r| !r.is_empty())
        .collect();

    AnalysisSummary {
        total_countries: rows.len(),
        countries_with_homicide_data: rows.iter().filter(|r| r.homicide_rate.is_some()).count(),
        countries_with_gpi_data: rows.iter().filter(|r| r.gpi_score.is_some()).count(),
        countries_with_advisory_data: rows.iter().filter(|r| r.advisory_level.is_some()).count(),
        countries_with_safety_data: rows.iter().filter(|r| r.tsi.is_finite()).count(),
        mean_homicide_rate: mean(rows.iter().filter_map(|r| r.homicide_rate)),
        mean_crime_score: risk_map
            .and_then(|map| mean(map.values().map(|r| f64::from(r.risk_scores.crime)))),
        regions_covered: regions.len(),
    }
}

/// The `n` highest-TSI rows, best first.
pub fn top_by_tsi(rows: &[AnalysisRow], n: usize) -> Vec<&AnalysisRow> {
    let mut sorted: Vec<&AnalysisRow> = rows.iter().collect();
    sorted.sort_by(|a, b| b.tsi.total_cmp(&a.tsi));
    sorted.truncate(n);
    sorted
}
