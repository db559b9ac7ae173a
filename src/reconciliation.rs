// ⚖️ Reconciliation - partition locality names against the canonical set
//
// After overrides, matching is exact set membership. No best-guess fallback:
// every name that is not canonical lands in `unresolved` for a human to
// write a new override rule.

use crate::canonical::{CanonicalSet, Succession};
use crate::error::{ReconError, ReconResult};
use crate::near_duplicates::NearDuplicate;
use crate::record::LocalityRecord;
use crate::rules::{OverrideHit, OverrideTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// PARTITION
// ============================================================================

/// matched ∪ unresolved == input, matched ∩ unresolved == ∅
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub matched: BTreeSet<String>,
    pub unresolved: BTreeSet<String>,
}

impl Partition {
    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn total(&self) -> usize {
        self.matched.len() + self.unresolved.len()
    }
}

/// Split names into canonical and unresolved
///
/// An empty canonical set is fatal: with nothing to match against, reporting
/// every name as unresolved would hide a broken reference source.
pub fn reconcile<I, S>(localities: I, canonical: &CanonicalSet) -> ReconResult<Partition>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if canonical.is_empty() {
        return Err(ReconError::EmptyCanonicalSet);
    }

    let mut partition = Partition::default();

    for name in localities {
        let name = name.as_ref();
        if canonical.contains(name) {
            partition.matched.insert(name.to_string());
        } else {
            partition.unresolved.insert(name.to_string());
        }
    }

    Ok(partition)
}

// ============================================================================
// DATASET CORRECTION
// ============================================================================

/// Apply overrides to every record's locality; the input is left untouched
pub fn correct_dataset(
    records: &[LocalityRecord],
    table: &OverrideTable,
) -> (Vec<LocalityRecord>, Vec<OverrideHit>) {
    let names: Vec<&str> = records.iter().map(|r| r.locality.as_str()).collect();
    let (corrected_names, hits) = table.apply_traced(&names);

    let corrected = records
        .iter()
        .zip(corrected_names)
        .map(|(record, name)| {
            if name == record.locality {
                record.clone()
            } else {
                record.renamed(&name)
            }
        })
        .collect();

    (corrected, hits)
}

// ============================================================================
// REPORT
// ============================================================================

/// A matched name that comes from the former-communes list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormerMatch {
    pub name: String,
    pub dissolved_in: i32,
    pub succession: Succession,
}

/// Distinct raw → corrected substitution with how often it fired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOverride {
    pub rule_id: String,
    pub raw: String,
    pub corrected: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub partition: Partition,
    pub near_duplicates: Vec<NearDuplicate>,
    pub overrides: Vec<AppliedOverride>,
    pub former_matches: Vec<FormerMatch>,
    pub max_distance: usize,
    pub locality_rows: usize,
    pub country_rows: usize,
    pub dropped_note_rows: usize,
    pub malformed_fields: usize,
    pub rules_fingerprint: String,
    pub canonical_fingerprint: String,
    pub generated_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_resolved(&self) -> bool {
        self.partition.is_resolved()
    }

    pub fn unresolved(&self) -> &BTreeSet<String> {
        &self.partition.unresolved
    }

    pub fn matched(&self) -> &BTreeSet<String> {
        &self.partition.matched
    }

    /// Source spellings an override rewrote into `name`
    pub fn raw_spellings_of(&self, name: &str) -> Vec<&str> {
        let mut raw: Vec<&str> = self
            .overrides
            .iter()
            .filter(|o| o.corrected == name)
            .map(|o| o.raw.as_str())
            .collect();
        raw.sort_unstable();
        raw.dedup();
        raw
    }

    /// Near-duplicate pairs that involve an unresolved name
    ///
    /// Pairs are computed on source spellings, so a name produced by an
    /// override is looked up through the spellings that override rewrote.
    /// These are the most useful hints when writing the next override rule.
    pub fn hints_for(&self, name: &str) -> Vec<&NearDuplicate> {
        let raw = self.raw_spellings_of(name);

        self.near_duplicates
            .iter()
            .filter(|pair| pair.involves(name) || raw.iter().any(|r| pair.involves(r)))
            .collect()
    }

    /// Other spelling and distance for each hint on `name`
    pub fn hint_candidates(&self, name: &str) -> Vec<(&str, usize)> {
        let raw = self.raw_spellings_of(name);

        self.hints_for(name)
            .into_iter()
            .filter_map(|pair| {
                std::iter::once(name)
                    .chain(raw.iter().copied())
                    .find_map(|spelling| pair.other(spelling))
                    .map(|other| (other, pair.distance))
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation: {} localities ({} matched, {} unresolved), {} override rows, {} near-duplicate pairs (≤{}), {} country rows, {} malformed cells",
            self.partition.total(),
            self.partition.matched.len(),
            self.partition.unresolved.len(),
            self.overrides.iter().map(|o| o.rows).sum::<usize>(),
            self.near_duplicates.len(),
            self.max_distance,
            self.country_rows,
            self.malformed_fields
        )
    }
}

/// Collapse per-row hits into distinct substitutions, in first-seen order
pub fn summarize_hits(hits: &[OverrideHit]) -> Vec<AppliedOverride> {
    let mut applied: Vec<AppliedOverride> = Vec::new();

    for hit in hits {
        match applied
            .iter_mut()
            .find(|a| a.raw == hit.raw && a.rule_id == hit.rule_id)
        {
            Some(existing) => existing.rows += 1,
            None => applied.push(AppliedOverride {
                rule_id: hit.rule_id.clone(),
                raw: hit.raw.clone(),
                corrected: hit.corrected.clone(),
                rows: 1,
            }),
        }
    }

    applied
}

/// Former communes among the matched names
pub fn former_matches(partition: &Partition, canonical: &CanonicalSet) -> Vec<FormerMatch> {
    partition
        .matched
        .iter()
        .filter_map(|name| canonical.get(name))
        .filter_map(|entry| {
            entry.dissolved_in().map(|dissolved_in| FormerMatch {
                name: entry.name.clone(),
                dissolved_in,
                succession: entry.succession.clone(),
            })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalName, CanonicalSetBuilder};
    use crate::rules::{apply_overrides, OverrideRule};

    fn lux_table() -> OverrideTable {
        OverrideTable::new(vec![
            OverrideRule::exact("lux-ville", "Luxembourg-Ville", "Luxembourg"),
            OverrideRule::exact("petange", "P.tange", "Pétange"),
        ])
        .unwrap()
    }

    #[test]
    fn test_reconcile_after_overrides() {
        let canonical = CanonicalSet::from_current(&["Luxembourg", "Pétange"]);
        let raw = ["Luxembourg-Ville", "P.tange", "Mamer"];

        let corrected = apply_overrides(&raw, &lux_table());
        let partition = reconcile(&corrected, &canonical).unwrap();

        let matched: BTreeSet<String> = ["Luxembourg", "Pétange"].iter().map(|s| s.to_string()).collect();
        let unresolved: BTreeSet<String> = ["Mamer"].iter().map(|s| s.to_string()).collect();

        assert_eq!(partition.matched, matched);
        assert_eq!(partition.unresolved, unresolved);
        assert!(!partition.is_resolved());
    }

    #[test]
    fn test_reconcile_is_exact_partition() {
        let canonical = CanonicalSet::from_current(&["Mamer", "Wiltz", "Vianden"]);
        let input = ["Mamer", "mamer", "Wiltz", "Wilz", "Mamer"];

        let partition = reconcile(input, &canonical).unwrap();

        let distinct: BTreeSet<String> = input.iter().map(|s| s.to_string()).collect();
        let union: BTreeSet<String> = partition.matched.union(&partition.unresolved).cloned().collect();

        assert_eq!(union, distinct);
        assert!(partition.matched.is_disjoint(&partition.unresolved));
        // No case folding, no fuzzy fallback
        assert!(partition.unresolved.contains("mamer"));
        assert!(partition.unresolved.contains("Wilz"));
    }

    #[test]
    fn test_empty_canonical_set_is_fatal() {
        let canonical = CanonicalSet::default();
        let result = reconcile(["Mamer"], &canonical);
        assert_eq!(result.unwrap_err(), ReconError::EmptyCanonicalSet);
    }

    #[test]
    fn test_all_resolved() {
        let canonical = CanonicalSet::from_current(&["Mamer"]);
        let partition = reconcile(["Mamer", "Mamer"], &canonical).unwrap();
        assert!(partition.is_resolved());
        assert_eq!(partition.total(), 1);
    }

    #[test]
    fn test_correct_dataset_returns_new_records() {
        let records = vec![
            LocalityRecord::new(2010, "Luxembourg-Ville").with_price("average_price", Some(6000.0)),
            LocalityRecord::new(2010, "Mamer"),
            LocalityRecord::new(2011, "Luxembourg-Ville"),
        ];

        let (corrected, hits) = correct_dataset(&records, &lux_table());

        assert_eq!(records[0].locality, "Luxembourg-Ville");
        assert_eq!(corrected[0].locality, "Luxembourg");
        assert_eq!(corrected[0].price("average_price"), Some(6000.0));
        assert_eq!(corrected[1].locality, "Mamer");
        assert_eq!(hits.len(), 2);

        let applied = summarize_hits(&hits);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].rows, 2);
        assert_eq!(applied[0].corrected, "Luxembourg");
    }

    #[test]
    fn test_former_matches() {
        let canonical = CanonicalSetBuilder::new()
            .current(&["Käerjeng"])
            .former(vec![CanonicalName::former(
                "Bascharage",
                2012,
                Succession::Successor("Käerjeng".to_string()),
            )])
            .build()
            .unwrap();

        let partition = reconcile(["Bascharage", "Käerjeng"], &canonical).unwrap();
        let former = former_matches(&partition, &canonical);

        assert_eq!(former.len(), 1);
        assert_eq!(former[0].name, "Bascharage");
        assert_eq!(former[0].dissolved_in, 2012);
    }

    #[test]
    fn test_hints_follow_overridden_spelling() {
        // "Wilts" is rewritten to a name that is still not canonical
        let report = ReconciliationReport {
            partition: Partition {
                matched: ["Wiltz".to_string()].into_iter().collect(),
                unresolved: ["Wiltz-Ville".to_string()].into_iter().collect(),
            },
            near_duplicates: crate::near_duplicates::detect_near_duplicates(&["Wilts", "Wiltz"], 2),
            overrides: vec![AppliedOverride {
                rule_id: "wilts".to_string(),
                raw: "Wilts".to_string(),
                corrected: "Wiltz-Ville".to_string(),
                rows: 3,
            }],
            former_matches: vec![],
            max_distance: 2,
            locality_rows: 5,
            country_rows: 0,
            dropped_note_rows: 0,
            malformed_fields: 0,
            rules_fingerprint: String::new(),
            canonical_fingerprint: String::new(),
            generated_at: Utc::now(),
        };

        assert_eq!(report.raw_spellings_of("Wiltz-Ville"), vec!["Wilts"]);

        assert_eq!(report.hints_for("Wiltz-Ville").len(), 1);
        assert_eq!(report.hint_candidates("Wiltz-Ville"), vec![("Wiltz", 1)]);
        assert!(report.hints_for("Mamer").is_empty());
    }

    #[test]
    fn test_report_summary_and_hints() {
        let report = ReconciliationReport {
            partition: Partition {
                matched: ["Käerjeng".to_string()].into_iter().collect(),
                unresolved: ["Kaerjeng".to_string()].into_iter().collect(),
            },
            near_duplicates: crate::near_duplicates::detect_near_duplicates(&["Kaerjeng", "Käerjeng"], 2),
            overrides: vec![],
            former_matches: vec![],
            max_distance: 2,
            locality_rows: 2,
            country_rows: 1,
            dropped_note_rows: 0,
            malformed_fields: 0,
            rules_fingerprint: String::new(),
            canonical_fingerprint: String::new(),
            generated_at: Utc::now(),
        };

        assert!(!report.is_resolved());
        assert_eq!(report.hints_for("Kaerjeng").len(), 1);
        assert_eq!(report.hint_candidates("Kaerjeng"), vec![("Käerjeng", 1)]);
        assert!(report.summary().contains("1 unresolved"));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"unresolved\":[\"Kaerjeng\"]"));
    }
}
