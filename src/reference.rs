// 📜 Reference lists - scraped commune names exported to CSV
//
// current.csv:  name
// former.csv:   name,dissolved_in,successor
//
// successor column: blank = unknown, "*" = merged with no single successor,
// anything else = name of the commune it became part of.

use crate::canonical::{CanonicalName, Succession};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Marker in the successor column for multi-way mergers
pub const NO_SINGLE_SUCCESSOR: &str = "*";

#[derive(Debug, Deserialize)]
struct CurrentRow {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FormerRow {
    name: String,
    dissolved_in: i32,
    #[serde(default)]
    successor: Option<String>,
}

impl FormerRow {
    fn into_canonical(self) -> CanonicalName {
        let succession = match self.successor.as_deref().map(str::trim) {
            None | Some("") => Succession::Unknown,
            Some(NO_SINGLE_SUCCESSOR) => Succession::NoSingleSuccessor,
            Some(name) => Succession::Successor(name.to_string()),
        };
        CanonicalName::former(self.name.trim(), self.dissolved_in, succession)
    }
}

/// Load current commune names
pub fn load_current_names(csv_path: &Path) -> Result<Vec<String>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open reference list: {}", csv_path.display()))?;

    let mut names = Vec::new();
    for (row, result) in rdr.deserialize().enumerate() {
        let record: CurrentRow = result
            .with_context(|| format!("Failed to parse {} line {}", csv_path.display(), row + 2))?;
        let name = record.name.trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }

    debug!(count = names.len(), path = %csv_path.display(), "loaded current communes");
    Ok(names)
}

/// Load former (dissolved) communes with their succession
pub fn load_former_names(csv_path: &Path) -> Result<Vec<CanonicalName>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open reference list: {}", csv_path.display()))?;

    let mut entries = Vec::new();
    for (row, result) in rdr.deserialize().enumerate() {
        let record: FormerRow = result
            .with_context(|| format!("Failed to parse {} line {}", csv_path.display(), row + 2))?;
        if !record.name.trim().is_empty() {
            entries.push(record.into_canonical());
        }
    }

    debug!(count = entries.len(), path = %csv_path.display(), "loaded former communes");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_current_names_skips_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current.csv");
        std::fs::write(&path, "name\nMamer\n\" \"\nPétange\n").unwrap();

        let names = load_current_names(&path).unwrap();
        assert_eq!(names, vec!["Mamer", "Pétange"]);
    }

    #[test]
    fn test_load_former_names_succession() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("former.csv");
        std::fs::write(
            &path,
            "name,dissolved_in,successor\n\
             Bascharage,2012,Käerjeng\n\
             Heiderscheid,2011,*\n\
             Medernach,2006,\n",
        )
        .unwrap();

        let entries = load_former_names(&path).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].succession, Succession::Successor("Käerjeng".to_string()));
        assert_eq!(entries[1].succession, Succession::NoSingleSuccessor);
        assert_eq!(entries[2].succession, Succession::Unknown);
        assert_eq!(entries[2].dissolved_in(), Some(2006));
    }

    #[test]
    fn test_load_former_names_bad_year() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("former.csv");
        std::fs::write(&path, "name,dissolved_in,successor\nBascharage,later,\n").unwrap();

        assert!(load_former_names(&path).is_err());
    }
}
