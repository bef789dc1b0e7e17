//! Homicide-rate table extraction from the Wikipedia list page.

use crate::normalize::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A candidate table needs more data rows than this.
const MIN_TABLE_ROWS: usize = 50;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

/// Footnote markers, reference brackets and stray digits in country cells.
static NAME_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*\d\[\]]").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomicideRow {
    pub country: String,
    /// Intentional homicides per 100,000 inhabitants
    pub rate: f64,
}

struct ParsedTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ParsedTable {
    fn column(&self, needles: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| needles.iter().any(|n| h.contains(n)))
    }

    fn looks_like_homicide_table(&self) -> bool {
        self.rows.len() > MIN_TABLE_ROWS
            && self.column(&["country", "location"]).is_some()
            && self.column(&["rate"]).is_some()
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    collapse_whitespace(&cell.text().collect::<String>())
}

/// Nearest enclosing `table` element.
fn owning_table(tr: ElementRef<'_>) -> Option<ElementRef<'_>> {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
}

/// Only rows of this table count; rows of tables nested in a cell belong to
/// those tables.
fn parse_table(table: ElementRef<'_>) -> ParsedTable {
    let mut headers = Vec::new();
    let mut rows = Vec::new();

    let own_rows = table
        .select(&ROW)
        .filter(|tr| owning_table(*tr).is_some_and(|t| t.id() == table.id()));
    for tr in own_rows {
        let cells: Vec<ElementRef<'_>> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "th" | "td"))
            .collect();
        let is_header = cells.iter().all(|c| c.value().name() == "th");
        let cells: Vec<String> = cells.into_iter().map(cell_text).collect();
        if is_header {
            if headers.is_empty() {
                headers = cells.iter().map(|c| c.to_lowercase()).collect();
            }
        } else {
            rows.push(cells);
        }
    }

    ParsedTable { headers, rows }
}

/// Strip footnote noise from a country cell.
pub fn clean_country(raw: &str) -> String {
    collapse_whitespace(&NAME_NOISE.replace_all(raw, ""))
}

/// A rate is a finite, non-negative number; anything else is treated as
/// missing.
fn parse_rate(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite() && *r >= 0.0)
}

/// Pull (country, rate) rows out of the list page.
///
/// Picks the first table with enough rows and country/rate headers, or the
/// largest table when none qualifies. Rows with a non-numeric rate are
/// dropped. An unrecognisable page yields no rows.
pub fn extract_rates(html: &str) -> Vec<HomicideRow> {
    let document = Html::parse_document(html);
    let tables: Vec<ParsedTable> = document.select(&TABLE).map(parse_table).collect();
    debug!("Found {} tables on homicide page", tables.len());

    let Some(table) = tables
        .iter()
        .find(|t| t.looks_like_homicide_table())
        .or_else(|| tables.iter().max_by_key(|t| t.rows.len()))
    else {
        warn!("No tables found on homicide page");
        return Vec::new();
    };

    let country_col = table.column(&["country", "location"]).unwrap_or(0);
    let Some(rate_col) = table.column(&["rate"]) else {
        warn!("Homicide table has no rate column: {:?}", table.headers);
        return Vec::new();
    };

    let rows: Vec<HomicideRow> = table
        .rows
        .iter()
        .filter_map(|cells| {
            let rate = parse_rate(cells.get(rate_col)?)?;
            let country = clean_country(cells.get(country_col)?);
            (!country.is_empty()).then_some(HomicideRow { country, rate })
        })
        .collect();

    info!("Loaded {} homicide records", rows.len());
    rows
}
