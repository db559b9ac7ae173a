// ⚙️ Run configuration
// Every field has a default so a partial JSON file (or none) is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Column names in the yearly dataset CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetColumns {
    pub year: String,
    pub locality: String,
    /// Optional offer-count column; ignored when absent from the file
    pub offers: Option<String>,
    /// Every header starting with this prefix is a price field
    pub price_prefix: String,
}

impl Default for DatasetColumns {
    fn default() -> Self {
        DatasetColumns {
            year: "year".to_string(),
            locality: "locality".to_string(),
            offers: Some("offers".to_string()),
            price_prefix: "average_price".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Edit-distance threshold for near-duplicate detection
    pub max_distance: usize,

    /// Names starting with one of these are national aggregate rows
    pub country_prefixes: Vec<String>,

    /// Names starting with one of these are citation/footnote rows
    pub note_prefixes: Vec<String>,

    /// Former communes dissolved in or before this year are out of scope.
    /// None = first year present in the dataset.
    pub former_cutoff_year: Option<i32>,

    /// None = first year present in the dataset
    pub index_base_year: Option<i32>,

    /// None = first price column
    pub index_column: Option<String>,

    pub columns: DatasetColumns,
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            max_distance: crate::DEFAULT_MAX_DISTANCE,
            country_prefixes: vec!["Pays".to_string(), "Total".to_string()],
            note_prefixes: vec!["Source".to_string(), "Note".to_string()],
            former_cutoff_year: None,
            index_base_year: None,
            index_column: None,
            columns: DatasetColumns::default(),
        }
    }
}

impl ReconConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Load from file when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// All prefixes that mark a row as something other than a locality
    pub fn aggregate_prefixes(&self) -> Vec<String> {
        self.country_prefixes
            .iter()
            .chain(self.note_prefixes.iter())
            .cloned()
            .collect()
    }
}
