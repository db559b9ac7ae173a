// Locality Reconciler - Core Library
// Exposes all modules for use in the CLI, the review TUI, and tests

pub mod error;
pub mod config;
pub mod record;            // Dataset rows, loader, row classification
pub mod reference;         // Current / former commune lists
pub mod canonical;         // Canonical name set
pub mod rules;             // Override rules as data
pub mod near_duplicates;   // Candidate misspellings
pub mod reconciliation;    // Partition + report
pub mod pipeline;          // One run, stage by stage
pub mod price_index;       // Base-year price index

// Re-export commonly used types
pub use error::{ReconError, ReconResult};
pub use config::{DatasetColumns, ReconConfig};
pub use record::{
    LocalityRecord, LoadedDataset, MalformedField, RowClassifier, RowKind, SplitDataset,
    clean_locality_name, load_dataset, parse_number, split_dataset, write_dataset,
};
pub use reference::{load_current_names, load_former_names};
pub use canonical::{
    CanonicalName, CanonicalSet, CanonicalSetBuilder, Provenance, Succession,
};
pub use rules::{
    MatchKind, OverrideHit, OverrideRule, OverrideTable, apply_overrides,
};
pub use near_duplicates::{
    NearDuplicate, NearDuplicateDetector, detect_near_duplicates, edit_distance,
};
pub use reconciliation::{
    AppliedOverride, FormerMatch, Partition, ReconciliationReport,
    correct_dataset, reconcile,
};
pub use pipeline::{LoadedSources, ReconOutcome, Sources, load_sources, run};
pub use price_index::{IndexPoint, PriceIndex};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default edit-distance threshold for near-duplicate detection
pub const DEFAULT_MAX_DISTANCE: usize = 2;
