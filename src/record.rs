// 📂 Locality Records - yearly housing-price rows
// Loading, numeric coercion with local recovery, name cleaning,
// and routing of aggregate rows away from locality matching.

use crate::config::DatasetColumns;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// RECORD
// ============================================================================

/// One row of the yearly dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalityRecord {
    pub year: i32,

    /// Free-text name as found in the source (after cleaning)
    pub locality: String,

    pub offer_count: Option<u32>,

    /// Price column name → value. None = suppressed or garbage in the source.
    pub prices: BTreeMap<String, Option<f64>>,
}

impl LocalityRecord {
    pub fn new(year: i32, locality: &str) -> Self {
        LocalityRecord {
            year,
            locality: locality.to_string(),
            offer_count: None,
            prices: BTreeMap::new(),
        }
    }

    /// Builder pattern: add offer count
    pub fn with_offers(mut self, offers: u32) -> Self {
        self.offer_count = Some(offers);
        self
    }

    /// Builder pattern: add a price field
    pub fn with_price(mut self, column: &str, value: Option<f64>) -> Self {
        self.prices.insert(column.to_string(), value);
        self
    }

    pub fn price(&self, column: &str) -> Option<f64> {
        self.prices.get(column).copied().flatten()
    }

    /// Same record under another name
    pub fn renamed(&self, locality: &str) -> Self {
        LocalityRecord {
            locality: locality.to_string(),
            ..self.clone()
        }
    }
}

/// A cell that failed numeric coercion and was loaded as missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedField {
    /// 1-indexed line in the source file (header = line 1)
    pub line: usize,
    pub column: String,
    pub raw: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedDataset {
    pub records: Vec<LocalityRecord>,
    pub price_columns: Vec<String>,
    pub malformed: Vec<MalformedField>,
}

impl LoadedDataset {
    pub fn first_year(&self) -> Option<i32> {
        self.records.iter().map(|r| r.year).min()
    }
}

// ============================================================================
// NUMERIC COERCION
// ============================================================================

/// Parse a number the way the source spreadsheets write them:
/// "1 234,5", "1\u{a0}234.5", "1.234,5", "1,234.5", "7250". Anything else is None.
///
/// With both `.` and `,` present, the last one is the decimal separator and
/// must occur once; the other is a thousands separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\''))
        .collect();

    if compact.is_empty() {
        return None;
    }

    let normalized = match (compact.rfind('.'), compact.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if comma > dot { (',', '.') } else { ('.', ',') };
            if compact.matches(decimal).count() != 1 {
                return None;
            }
            compact.replace(thousands, "").replace(decimal, ".")
        }
        (None, Some(_)) => compact.replace(',', "."),
        _ => compact,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_count(raw: &str) -> Option<u32> {
    let value = parse_number(raw)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return None;
    }
    Some(value as u32)
}

// ============================================================================
// LOADER
// ============================================================================

/// Load the yearly dataset from CSV
///
/// Price and offer cells that fail coercion become None and are listed in
/// `malformed`; empty cells are simply missing. A missing or non-integer year aborts the load.
pub fn load_dataset(csv_path: &Path, columns: &DatasetColumns) -> Result<LoadedDataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open dataset: {}", csv_path.display()))?;

    let headers = rdr.headers().context("Failed to read dataset header")?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);

    let year_idx = position(&columns.year)
        .ok_or_else(|| anyhow!("Dataset has no '{}' column", columns.year))?;
    let locality_idx = position(&columns.locality)
        .ok_or_else(|| anyhow!("Dataset has no '{}' column", columns.locality))?;
    let offers_idx = columns.offers.as_deref().and_then(position);

    let price_idx: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.trim().starts_with(&columns.price_prefix))
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();

    if price_idx.is_empty() {
        warn!(prefix = %columns.price_prefix, "dataset has no price columns");
    }

    let mut dataset = LoadedDataset {
        price_columns: price_idx.iter().map(|(_, name)| name.clone()).collect(),
        ..Default::default()
    };

    for (row, result) in rdr.records().enumerate() {
        let line = row + 2; // 1-indexed + header row
        let record = result.with_context(|| format!("Failed to parse CSV line {}", line))?;

        let raw_year = record.get(year_idx).unwrap_or("").trim();
        let year: i32 = raw_year
            .parse()
            .with_context(|| format!("Invalid year '{}' on line {}", raw_year, line))?;

        let mut locality = LocalityRecord::new(year, &clean_locality_name(record.get(locality_idx).unwrap_or("")));

        if let Some(idx) = offers_idx {
            let raw = record.get(idx).unwrap_or("");
            locality.offer_count = parse_count(raw);
            if locality.offer_count.is_none() && !raw.trim().is_empty() {
                dataset.malformed.push(MalformedField {
                    line,
                    column: headers.get(idx).unwrap_or("").to_string(),
                    raw: raw.to_string(),
                });
            }
        }

        for (idx, name) in &price_idx {
            let raw = record.get(*idx).unwrap_or("");
            let value = parse_number(raw);
            if value.is_none() && !raw.trim().is_empty() {
                dataset.malformed.push(MalformedField {
                    line,
                    column: name.clone(),
                    raw: raw.to_string(),
                });
            }
            locality.prices.insert(name.clone(), value);
        }

        dataset.records.push(locality);
    }

    if !dataset.malformed.is_empty() {
        warn!(
            count = dataset.malformed.len(),
            "numeric cells could not be parsed and were loaded as missing"
        );
    }
    debug!(rows = dataset.records.len(), path = %csv_path.display(), "loaded dataset");

    Ok(dataset)
}

/// Write records back out in the same column layout
pub fn write_dataset(
    csv_path: &Path,
    records: &[LocalityRecord],
    price_columns: &[String],
    columns: &DatasetColumns,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;

    let offers_header = columns.offers.clone().unwrap_or_else(|| "offers".to_string());
    let mut header = vec![columns.year.clone(), columns.locality.clone(), offers_header];
    header.extend(price_columns.iter().cloned());
    wtr.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.year.to_string(),
            record.locality.clone(),
            record.offer_count.map(|c| c.to_string()).unwrap_or_default(),
        ];
        row.extend(
            price_columns
                .iter()
                .map(|c| record.price(c).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

// ============================================================================
// NAME CLEANING
// ============================================================================

/// Trim, collapse whitespace, and strip trailing footnote markers
///
/// "Wiltz *" → "Wiltz", "Clervaux (1)" → "Clervaux", "Vianden²" → "Vianden"
pub fn clean_locality_name(raw: &str) -> String {
    let mut name = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    loop {
        let before = name.len();

        name = name
            .trim_end_matches(|c: char| {
                matches!(c, '*' | '†' | '¹' | '²' | '³' | '⁴' | '⁵' | '⁶' | '⁷' | '⁸' | '⁹' | '⁰')
            })
            .trim_end()
            .to_string();

        if name.ends_with(')') {
            if let Some(open) = name.rfind('(') {
                let inner = &name[open + 1..name.len() - 1];
                if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
                    name.truncate(open);
                    name = name.trim_end().to_string();
                }
            }
        }

        if name.len() == before {
            break;
        }
    }

    name
}

// ============================================================================
// ROW CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    Locality,
    /// National aggregate row
    Country,
    /// Source citation or footnote text
    SourceNote,
}

#[derive(Debug, Clone)]
pub struct RowClassifier {
    country_prefixes: Vec<String>,
    note_prefixes: Vec<String>,
}

impl RowClassifier {
    pub fn new(country_prefixes: &[String], note_prefixes: &[String]) -> Self {
        RowClassifier {
            country_prefixes: country_prefixes.iter().map(|p| p.to_lowercase()).collect(),
            note_prefixes: note_prefixes.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Case-insensitive prefix test against the cleaned name
    pub fn classify(&self, name: &str) -> RowKind {
        let lower = name.trim().to_lowercase();

        if self.note_prefixes.iter().any(|p| lower.starts_with(p.as_str())) {
            RowKind::SourceNote
        } else if self.country_prefixes.iter().any(|p| lower.starts_with(p.as_str())) {
            RowKind::Country
        } else {
            RowKind::Locality
        }
    }
}

/// Records routed by row kind
#[derive(Debug, Clone, Default)]
pub struct SplitDataset {
    pub localities: Vec<LocalityRecord>,
    pub country: Vec<LocalityRecord>,
    pub dropped_notes: usize,
}

impl SplitDataset {
    /// Distinct locality names, sorted
    pub fn distinct_names(&self) -> BTreeSet<String> {
        self.localities.iter().map(|r| r.locality.clone()).collect()
    }
}

pub fn split_dataset(records: &[LocalityRecord], classifier: &RowClassifier) -> SplitDataset {
    let mut split = SplitDataset::default();

    for record in records {
        match classifier.classify(&record.locality) {
            RowKind::Locality => split.localities.push(record.clone()),
            RowKind::Country => split.country.push(record.clone()),
            RowKind::SourceNote => split.dropped_notes += 1,
        }
    }

    debug!(
        localities = split.localities.len(),
        country = split.country.len(),
        dropped = split.dropped_notes,
        "split dataset by row kind"
    );

    split
}

// ============================================================================
// TESTS
// ============================================================================
