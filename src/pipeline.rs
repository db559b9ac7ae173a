// 🔗 Pipeline - one reconciliation run, as plain function composition
//
// raw records → classify rows → detect near-duplicates (raw names)
//             → apply overrides → reconcile → report
//
// Every stage borrows its input and returns a new value.

use crate::canonical::{CanonicalSet, CanonicalSetBuilder};
use crate::config::ReconConfig;
use crate::error::ReconResult;
use crate::near_duplicates::NearDuplicateDetector;
use crate::record::{load_dataset, split_dataset, LoadedDataset, LocalityRecord, RowClassifier};
use crate::reconciliation::{
    correct_dataset, former_matches, reconcile, summarize_hits, ReconciliationReport,
};
use crate::reference::{load_current_names, load_former_names};
use crate::rules::OverrideTable;
use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

// ============================================================================
// RUN OUTCOME
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconOutcome {
    /// Locality rows with overrides applied
    pub corrected: Vec<LocalityRecord>,

    /// National aggregate rows, never matched against localities
    pub country: Vec<LocalityRecord>,

    pub report: ReconciliationReport,
}

/// Run the reconciliation over already-loaded inputs
///
/// `malformed_fields` is carried into the report; the loader recovered from
/// those cells already.
pub fn run(
    records: &[LocalityRecord],
    canonical: &CanonicalSet,
    overrides: &OverrideTable,
    config: &ReconConfig,
    malformed_fields: usize,
) -> ReconResult<ReconOutcome> {
    let classifier = RowClassifier::new(&config.country_prefixes, &config.note_prefixes);
    let split = split_dataset(records, &classifier);

    let raw_names: Vec<String> = split.distinct_names().into_iter().collect();
    let near_duplicates = NearDuplicateDetector::with_max_distance(config.max_distance)
        .excluding(&config.aggregate_prefixes())
        .detect(&raw_names);

    let (corrected, hits) = correct_dataset(&split.localities, overrides);

    let partition = reconcile(corrected.iter().map(|r| r.locality.as_str()), canonical)?;

    for name in &partition.unresolved {
        warn!(locality = %name, "no canonical match; needs an override rule");
    }

    let report = ReconciliationReport {
        former_matches: former_matches(&partition, canonical),
        partition,
        near_duplicates,
        overrides: summarize_hits(&hits),
        max_distance: config.max_distance,
        locality_rows: corrected.len(),
        country_rows: split.country.len(),
        dropped_note_rows: split.dropped_notes,
        malformed_fields,
        rules_fingerprint: overrides.fingerprint(),
        canonical_fingerprint: canonical.fingerprint(),
        generated_at: Utc::now(),
    };

    info!("{}", report.summary());

    Ok(ReconOutcome {
        corrected,
        country: split.country,
        report,
    })
}

// ============================================================================
// FILE SOURCES
// ============================================================================

/// Input files for one run
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub data: PathBuf,
    pub current: PathBuf,
    pub former: Option<PathBuf>,
    pub rules: Option<PathBuf>,
}

/// Everything a run needs, loaded from disk
#[derive(Debug, Clone)]
pub struct LoadedSources {
    pub dataset: LoadedDataset,
    pub canonical: CanonicalSet,
    pub overrides: OverrideTable,
}

impl LoadedSources {
    pub fn run(&self, config: &ReconConfig) -> ReconResult<ReconOutcome> {
        run(
            &self.dataset.records,
            &self.canonical,
            &self.overrides,
            config,
            self.dataset.malformed.len(),
        )
    }
}

/// Load dataset, rules and reference lists, and assemble the canonical set
///
/// The former-communes cutoff defaults to the first dataset year: a commune
/// dissolved before the data starts cannot appear in it.
pub fn load_sources(sources: &Sources, config: &ReconConfig) -> Result<LoadedSources> {
    let dataset = load_dataset(&sources.data, &config.columns)?;

    let overrides = match &sources.rules {
        Some(path) => OverrideTable::from_file(path)?,
        None => OverrideTable::empty(),
    };

    let current = load_current_names(&sources.current)?;
    let former = match &sources.former {
        Some(path) => load_former_names(path)?,
        None => Vec::new(),
    };

    let mut builder = CanonicalSetBuilder::new()
        .current(&current)
        .former(former)
        .harmonize_with(&overrides);

    if let Some(cutoff) = config.former_cutoff_year.or_else(|| dataset.first_year()) {
        builder = builder.cutoff_year(cutoff);
    }

    let canonical = builder.build()?;

    info!(
        rows = dataset.records.len(),
        rules = overrides.len(),
        canonical = canonical.len(),
        "inputs loaded"
    );

    Ok(LoadedSources {
        dataset,
        canonical,
        overrides,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::OverrideRule;

    fn records() -> Vec<LocalityRecord> {
        vec![
            LocalityRecord::new(2010, "Luxembourg-Ville").with_price("average_price", Some(6000.0)),
            LocalityRecord::new(2010, "P.tange").with_price("average_price", Some(3800.0)),
            LocalityRecord::new(2010, "Mamer").with_price("average_price", Some(5200.0)),
            LocalityRecord::new(2010, "Pays").with_price("average_price", Some(4700.0)),
            LocalityRecord::new(2010, "Source : Observatoire de l'Habitat"),
            LocalityRecord::new(2011, "Luxembourg").with_price("average_price", Some(6300.0)),
        ]
    }

    fn table() -> OverrideTable {
        OverrideTable::new(vec![
            OverrideRule::exact("lux-ville", "Luxembourg-Ville", "Luxembourg"),
            OverrideRule::exact("petange", "P.tange", "Pétange"),
        ])
        .unwrap()
    }

    #[test]
    fn test_run_end_to_end() {
        let canonical = CanonicalSet::from_current(&["Luxembourg", "Pétange"]);
        let outcome = run(&records(), &canonical, &table(), &ReconConfig::default(), 3).unwrap();

        assert_eq!(outcome.corrected.len(), 4);
        assert_eq!(outcome.country.len(), 1);

        let report = &outcome.report;
        assert_eq!(report.matched().len(), 2);
        assert!(report.unresolved().contains("Mamer"));
        assert_eq!(report.dropped_note_rows, 1);
        assert_eq!(report.malformed_fields, 3);
        assert_eq!(report.overrides.len(), 2);
        assert!(!report.is_resolved());
    }

    #[test]
    fn test_country_rows_never_matched() {
        let canonical = CanonicalSet::from_current(&["Pays", "Mamer"]);
        let input = vec![
            LocalityRecord::new(2010, "Pays"),
            LocalityRecord::new(2010, "Mamer"),
        ];

        let outcome = run(&input, &canonical, &OverrideTable::empty(), &ReconConfig::default(), 0).unwrap();

        assert!(!outcome.report.matched().contains("Pays"));
        assert_eq!(outcome.report.partition.total(), 1);
    }

    #[test]
    fn test_near_duplicates_use_raw_names() {
        let input = vec![
            LocalityRecord::new(2010, "Kaerjeng"),
            LocalityRecord::new(2011, "Käerjeng"),
        ];
        let canonical = CanonicalSet::from_current(&["Käerjeng"]);

        let outcome = run(&input, &canonical, &OverrideTable::empty(), &ReconConfig::default(), 0).unwrap();

        assert_eq!(outcome.report.near_duplicates.len(), 1);
        assert_eq!(outcome.report.hints_for("Kaerjeng").len(), 1);
    }

    #[test]
    fn test_run_with_empty_canonical_set_fails() {
        let result = run(
            &records(),
            &CanonicalSet::default(),
            &table(),
            &ReconConfig::default(),
            0,
        );
        assert!(result.is_err());
    }
}
