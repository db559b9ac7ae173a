// 🏛️ Canonical Names - authoritative commune spellings
//
// Two reference lists feed the set:
// - current communes
// - former communes, with the year they were dissolved and what became of them
//
// A former commune is in scope if it still existed during the dataset's
// period, i.e. it was dissolved after the cutoff year. Reference spellings are
// harmonized through the same override table used on the dataset, so both
// sides of the comparison agree on diacritics and hyphenation.
//
// The set is assembled once per run and never changes afterwards.

use crate::error::{ReconError, ReconResult};
use crate::rules::OverrideTable;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// PROVENANCE / SUCCESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Listed among today's communes
    Current,

    /// Dissolved in the given year
    Former { dissolved_in: i32 },
}

/// What a former commune turned into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Succession {
    /// No successor recorded
    #[default]
    Unknown,

    /// Renamed, or absorbed into one existing commune
    Successor(String),

    /// Several former communes merged into a new one
    NoSingleSuccessor,
}

// ============================================================================
// CANONICAL NAME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalName {
    pub name: String,
    pub provenance: Provenance,
    pub succession: Succession,
}

impl CanonicalName {
    pub fn current(name: &str) -> Self {
        CanonicalName {
            name: name.to_string(),
            provenance: Provenance::Current,
            succession: Succession::Unknown,
        }
    }

    pub fn former(name: &str, dissolved_in: i32, succession: Succession) -> Self {
        CanonicalName {
            name: name.to_string(),
            provenance: Provenance::Former { dissolved_in },
            succession,
        }
    }

    pub fn is_current(&self) -> bool {
        self.provenance == Provenance::Current
    }

    pub fn dissolved_in(&self) -> Option<i32> {
        match self.provenance {
            Provenance::Current => None,
            Provenance::Former { dissolved_in } => Some(dissolved_in),
        }
    }
}

// ============================================================================
// CANONICAL SET
// ============================================================================

/// Immutable lookup of canonical names, keyed by exact spelling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalSet {
    names: BTreeMap<String, CanonicalName>,
}

impl CanonicalSet {
    /// Build directly from entries. A current entry wins over a former one
    /// with the same spelling.
    pub fn from_names<I: IntoIterator<Item = CanonicalName>>(entries: I) -> Self {
        let mut names: BTreeMap<String, CanonicalName> = BTreeMap::new();

        for entry in entries {
            let current_exists = names
                .get(&entry.name)
                .map_or(false, |existing| existing.is_current());

            if !current_exists {
                names.insert(entry.name.clone(), entry);
            }
        }

        CanonicalSet { names }
    }

    /// Convenience for tests and small fixed lists: all names current
    pub fn from_current<S: AsRef<str>>(names: &[S]) -> Self {
        Self::from_names(names.iter().map(|n| CanonicalName::current(n.as_ref())))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&CanonicalName> {
        self.names.get(name)
    }

    /// Where a historical name went, if it is a former commune
    pub fn succession_of(&self, name: &str) -> Option<&Succession> {
        self.names
            .get(name)
            .filter(|entry| !entry.is_current())
            .map(|entry| &entry.succession)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn current_count(&self) -> usize {
        self.names.values().filter(|n| n.is_current()).count()
    }

    pub fn former_count(&self) -> usize {
        self.len() - self.current_count()
    }

    /// SHA-256 over the sorted names, for auditing which reference produced a report
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in self.names.keys() {
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// BUILDER
// ============================================================================

#[derive(Debug, Default)]
pub struct CanonicalSetBuilder {
    current: Vec<String>,
    former: Vec<CanonicalName>,
    cutoff_year: Option<i32>,
    harmonize: Option<OverrideTable>,
}

impl CanonicalSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.current
            .extend(names.iter().map(|n| n.as_ref().trim().to_string()).filter(|n| !n.is_empty()));
        self
    }

    /// Former communes; entries that are not `Provenance::Former` are ignored
    pub fn former(mut self, entries: Vec<CanonicalName>) -> Self {
        self.former
            .extend(entries.into_iter().filter(|e| e.dissolved_in().is_some()));
        self
    }

    /// Former communes dissolved in or before this year are dropped
    pub fn cutoff_year(mut self, year: i32) -> Self {
        self.cutoff_year = Some(year);
        self
    }

    /// Rewrite reference spellings through the override table
    pub fn harmonize_with(mut self, table: &OverrideTable) -> Self {
        self.harmonize = Some(table.clone());
        self
    }

    pub fn build(self) -> ReconResult<CanonicalSet> {
        let fix = |name: &str| -> String {
            match &self.harmonize {
                Some(table) => table.correct(name).to_string(),
                None => name.to_string(),
            }
        };

        let current = self.current.iter().map(|n| CanonicalName::current(&fix(n)));

        let former_in_scope = self
            .former
            .iter()
            .filter(|entry| match (self.cutoff_year, entry.dissolved_in()) {
                (Some(cutoff), Some(year)) => year > cutoff,
                _ => true,
            })
            .map(|entry| CanonicalName {
                name: fix(&entry.name),
                ..entry.clone()
            });

        let set = CanonicalSet::from_names(current.chain(former_in_scope));

        if set.is_empty() {
            return Err(ReconError::EmptyCanonicalSet);
        }

        debug!(
            current = set.current_count(),
            former = set.former_count(),
            "assembled canonical set"
        );

        Ok(set)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::OverrideRule;

    fn former_list() -> Vec<CanonicalName> {
        vec![
            CanonicalName::former("Bascharage", 2012, Succession::Successor("Käerjeng".to_string())),
            CanonicalName::former("Clemency", 2012, Succession::Successor("Käerjeng".to_string())),
            CanonicalName::former("Eschweiler", 2015, Succession::Successor("Wiltz".to_string())),
            CanonicalName::former("Heiderscheid", 2011, Succession::NoSingleSuccessor),
            CanonicalName::former("Medernach", 2006, Succession::Unknown),
        ]
    }

    #[test]
    fn test_canonical_name_constructors() {
        let current = CanonicalName::current("Mamer");
        assert!(current.is_current());
        assert_eq!(current.dissolved_in(), None);

        let former = CanonicalName::former("Bascharage", 2012, Succession::Unknown);
        assert!(!former.is_current());
        assert_eq!(former.dissolved_in(), Some(2012));
    }

    #[test]
    fn test_current_wins_over_former_duplicate() {
        let set = CanonicalSet::from_names(vec![
            CanonicalName::former("Wiltz", 2015, Succession::Unknown),
            CanonicalName::current("Wiltz"),
            CanonicalName::former("Wiltz", 1990, Succession::Unknown),
        ]);

        assert_eq!(set.len(), 1);
        assert!(set.get("Wiltz").unwrap().is_current());
        assert_eq!(set.succession_of("Wiltz"), None);
    }

    #[test]
    fn test_builder_applies_cutoff() {
        let set = CanonicalSetBuilder::new()
            .current(&["Käerjeng", "Wiltz"])
            .former(former_list())
            .cutoff_year(2010)
            .build()
            .unwrap();

        assert!(set.contains("Bascharage"));
        assert!(set.contains("Heiderscheid"));
        assert!(set.contains("Eschweiler"));
        assert!(!set.contains("Medernach")); // dissolved before the data starts
        assert_eq!(set.current_count(), 2);
        assert_eq!(set.former_count(), 4);
    }

    #[test]
    fn test_builder_without_cutoff_keeps_all_former() {
        let set = CanonicalSetBuilder::new().former(former_list()).build().unwrap();
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn test_builder_harmonizes_reference_spelling() {
        let table = OverrideTable::new(vec![OverrideRule::exact(
            "kaerjeng",
            "Kaerjeng",
            "Käerjeng",
        )])
        .unwrap();

        let set = CanonicalSetBuilder::new()
            .current(&["Kaerjeng", "Mamer"])
            .harmonize_with(&table)
            .build()
            .unwrap();

        assert!(set.contains("Käerjeng"));
        assert!(!set.contains("Kaerjeng"));
    }

    #[test]
    fn test_succession_lookup() {
        let set = CanonicalSetBuilder::new()
            .current(&["Käerjeng"])
            .former(former_list())
            .build()
            .unwrap();

        assert_eq!(
            set.succession_of("Clemency"),
            Some(&Succession::Successor("Käerjeng".to_string()))
        );
        assert_eq!(set.succession_of("Heiderscheid"), Some(&Succession::NoSingleSuccessor));
        assert_eq!(set.succession_of("Käerjeng"), None);
    }

    #[test]
    fn test_empty_builder_is_fatal() {
        let result = CanonicalSetBuilder::new().current(&["  ", ""]).build();
        assert_eq!(result.unwrap_err(), ReconError::EmptyCanonicalSet);
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = CanonicalSet::from_current(&["Mamer", "Wiltz"]);
        let b = CanonicalSet::from_current(&["Wiltz", "Mamer"]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), CanonicalSet::from_current(&["Mamer"]).fingerprint());
    }
}
