//! On-disk artifacts: the ranking cache, the manual advisory table and the
//! JSON/CSV outputs.

use crate::error::{Result, SafetyError};
use crate::model::RiskRecord;
use crate::ranking::RankingRow;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use tracing::{debug, info, warn};

const RANKING_COLUMNS: [&str; 3] = ["country_gpi", "gpi_score", "gpi_rank"];

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Read a cached ranking table. A file missing any of the expected columns
/// is rejected as a whole.
pub fn read_ranking_cache(path: &Path) -> Result<Vec<RankingRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    if let Some(missing) = RANKING_COLUMNS
        .iter()
        .find(|col| !headers.iter().any(|h| h == **col))
    {
        return Err(SafetyError::Config(format!(
            "ranking cache {:?} has no {} column",
            path, missing
        )));
    }
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<RankingRow>, csv::Error>>()?;
    Ok(rows)
}

pub fn write_ranking_cache(path: &Path, rows: &[RankingRow]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!("Wrote {} ranking rows to {:?}", rows.len(), path);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ManualAdvisoryRow {
    #[serde(alias = "code_2", alias = "code")]
    country_code: String,
    advisory_level: Option<String>,
}

/// Manually maintained advisory levels (`country_code` or `code_2`, plus
/// `advisory_level`). Rows without a 1-4 level are skipped; the first row
/// per code wins.
pub fn read_manual_advisories<R: Read>(input: R) -> Result<BTreeMap<String, u8>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut levels = BTreeMap::new();
    let mut skipped = 0usize;

    for row in reader.deserialize::<ManualAdvisoryRow>() {
        let row = row?;
        let level = row
            .advisory_level
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|l| l.fract() == 0.0 && (1.0..=4.0).contains(l))
            .map(|l| l as u8);
        match level {
            Some(level) => {
                levels
                    .entry(row.country_code.trim().to_uppercase())
                    .or_insert(level);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} manual advisory rows without a 1-4 level", skipped);
    }
    Ok(levels)
}

pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    info!("Wrote {:?}", path);
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// The fused risk map written by the safety run.
pub fn read_risk_map(path: &Path) -> Result<BTreeMap<String, RiskRecord>> {
    read_json(path)
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gpi.csv");
        let rows = vec![
            RankingRow { country: "Iceland".into(), score: 1.095, rank: 1 },
            RankingRow { country: "New Zealand".into(), score: 1.282, rank: 3 },
        ];
        write_ranking_cache(&path, &rows).unwrap();
        assert_eq!(read_ranking_cache(&path).unwrap(), rows);
    }

    #[test]
    fn test_ranking_cache_missing_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpi.csv");
        std::fs::write(&path, "country_gpi,gpi_score\nIceland,1.095\n").unwrap();
        assert!(read_ranking_cache(&path).is_err());
    }

    #[test]
    fn test_manual_advisories_accepts_both_headers() {
        let a = read_manual_advisories("country_code,advisory_level\nfr,2\nMX,4.0\n".as_bytes()).unwrap();
        assert_eq!(a.get("FR"), Some(&2));
        assert_eq!(a.get("MX"), Some(&4));

        let b = read_manual_advisories("code_2,advisory_level\nJP,1\n".as_bytes()).unwrap();
        assert_eq!(b.get("JP"), Some(&1));
    }

    #[test]
    fn test_manual_advisories_skips_bad_levels() {
        let levels =
            read_manual_advisories("country_code,advisory_level\nAA,\nBB,9\nCC,2.5\nDD,3\nDD,1\n".as_bytes())
                .unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels.get("DD"), Some(&3));
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1u32);
        write_json_pretty(&path, &map).unwrap();
        let back: BTreeMap<String, u32> = read_json(&path).unwrap();
        assert_eq!(back, map);
    }
}
