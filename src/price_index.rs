// 📈 Price Index - per-locality and national series, base year = 100

use crate::record::LocalityRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    pub year: i32,
    /// None when the source value for that year is missing
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceIndex {
    pub column: String,
    pub base_year: i32,
    pub localities: BTreeMap<String, Vec<IndexPoint>>,
    pub national: Vec<IndexPoint>,
    /// Localities with no usable base-year value
    pub skipped: Vec<String>,
}

/// Index one series; None if the base year has no positive value.
fn index_series(points: &BTreeMap<i32, Option<f64>>, base_year: i32) -> Option<Vec<IndexPoint>> {
    let base = points.get(&base_year).copied().flatten().filter(|v| *v > 0.0)?;

    Some(
        points
            .iter()
            .map(|(year, value)| IndexPoint {
                year: *year,
                value: value.map(|v| v / base * 100.0),
            })
            .collect(),
    )
}

/// One value per year. Duplicate years keep the first value seen and log the dropped one.
fn series_by_year(
    series_name: &str,
    records: &[&LocalityRecord],
    column: &str,
) -> BTreeMap<i32, Option<f64>> {
    let mut series = BTreeMap::new();
    for record in records {
        match series.entry(record.year) {
            Entry::Vacant(slot) => {
                slot.insert(record.price(column));
            }
            Entry::Occupied(kept) => {
                // Overrides can fold two source spellings into one locality-year
                warn!(
                    series = series_name,
                    year = record.year,
                    kept = ?kept.get(),
                    dropped = ?record.price(column),
                    "duplicate year in index series; keeping the first value"
                );
            }
        }
    }
    series
}

impl PriceIndex {
    /// Compute index series from corrected locality rows and country rows
    pub fn compute(
        localities: &[LocalityRecord],
        country: &[LocalityRecord],
        column: &str,
        base_year: i32,
    ) -> Self {
        let mut grouped: BTreeMap<&str, Vec<&LocalityRecord>> = BTreeMap::new();
        for record in localities {
            grouped.entry(record.locality.as_str()).or_default().push(record);
        }

        let mut index = PriceIndex {
            column: column.to_string(),
            base_year,
            localities: BTreeMap::new(),
            national: Vec::new(),
            skipped: Vec::new(),
        };

        for (name, records) in grouped {
            match index_series(&series_by_year(name, &records, column), base_year) {
                Some(points) => {
                    index.localities.insert(name.to_string(), points);
                }
                None => index.skipped.push(name.to_string()),
            }
        }

        let country_refs: Vec<&LocalityRecord> = country.iter().collect();
        index.national =
            index_series(&series_by_year("national", &country_refs, column), base_year).unwrap_or_default();

        debug!(
            column,
            base_year,
            localities = index.localities.len(),
            skipped = index.skipped.len(),
            "computed price index"
        );

        index
    }

    /// Index of one locality in one year
    pub fn value(&self, locality: &str, year: i32) -> Option<f64> {
        self.localities
            .get(locality)?
            .iter()
            .find(|p| p.year == year)?
            .value
    }

    /// Long format: series,year,index ("national" for the country series)
    pub fn write_csv(&self, csv_path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;

        wtr.write_record(["series", "year", "index"])?;

        let mut rows: Vec<(String, &IndexPoint)> = self
            .national
            .iter()
            .map(|p| ("national".to_string(), p))
            .collect();
        for (name, points) in &self.localities {
            rows.extend(points.iter().map(|p| (name.clone(), p)));
        }

        for (series, point) in rows {
            wtr.write_record([
                series,
                point.year.to_string(),
                point.value.map(|v| format!("{:.2}", v)).unwrap_or_default(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::sync::{Arc, Mutex};

    const COL: &str = "average_price";

    /// In-memory log sink for checking warnings
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn row(year: i32, name: &str, price: Option<f64>) -> LocalityRecord {
        LocalityRecord::new(year, name).with_price(COL, price)
    }

    #[test]
    fn test_base_year_is_100() {
        let localities = vec![
            row(2010, "Mamer", Some(5000.0)),
            row(2011, "Mamer", Some(5500.0)),
            row(2012, "Mamer", None),
        ];
        let country = vec![row(2010, "Pays", Some(4000.0)), row(2011, "Pays", Some(5000.0))];

        let index = PriceIndex::compute(&localities, &country, COL, 2010);

        assert_eq!(index.value("Mamer", 2010), Some(100.0));
        assert!((index.value("Mamer", 2011).unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(index.value("Mamer", 2012), None);
        assert_eq!(index.national[1].value, Some(125.0));
    }

    #[test]
    fn test_merged_spellings_keep_first_value_per_year() {
        // "Luxembourg-Ville" and "Luxembourg" both corrected to "Luxembourg" for 2010
        let localities = vec![
            row(2010, "Luxembourg", Some(6000.0)),
            row(2010, "Luxembourg", Some(9000.0)),
            row(2011, "Luxembourg", Some(6600.0)),
        ];

        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(log.clone())
            .with_ansi(false)
            .finish();
        let index = tracing::subscriber::with_default(subscriber, || {
            PriceIndex::compute(&localities, &[], COL, 2010)
        });

        let output = log.contents();
        assert!(output.contains("duplicate year in index series"));
        assert!(output.contains("Luxembourg"));
        assert!(output.contains("year=2010"));

        assert_eq!(index.localities["Luxembourg"].len(), 2);
        assert_eq!(index.value("Luxembourg", 2010), Some(100.0));
        assert!((index.value("Luxembourg", 2011).unwrap() - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_base_value_is_skipped() {
        let localities = vec![row(2010, "Wiltz", None), row(2011, "Wiltz", Some(3000.0))];

        let index = PriceIndex::compute(&localities, &[], COL, 2010);

        assert!(index.localities.is_empty());
        assert_eq!(index.skipped, vec!["Wiltz"]);
        assert!(index.national.is_empty());
    }

    #[test]
    fn test_write_csv_long_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.csv");
        let index = PriceIndex::compute(
            &[row(2010, "Mamer", Some(5000.0))],
            &[row(2010, "Pays", Some(4000.0))],
            COL,
            2010,
        );

        index.write_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert!(content.starts_with("series,year,index\n"));
        assert!(content.contains("national,2010,100.00"));
        assert!(content.contains("Mamer,2010,100.00"));
    }
}
