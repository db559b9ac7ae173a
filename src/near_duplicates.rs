// 🔍 Near-Duplicate Detector - candidate misspellings for human review
//
// Pairwise Levenshtein distance over distinct names. Advisory only: nothing
// here rewrites a name. Comparison is quadratic in the number of distinct
// names, which is fine for a country's worth of communes (a few hundred) and
// is the known scaling limit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

// ============================================================================
// NEAR-DUPLICATE PAIR
// ============================================================================

/// Unordered pair, stored with `first < second`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NearDuplicate {
    pub first: String,
    pub second: String,
    pub distance: usize,
}

impl NearDuplicate {
    fn new(a: &str, b: &str, distance: usize) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        NearDuplicate {
            first: first.to_string(),
            second: second.to_string(),
            distance,
        }
    }

    pub fn involves(&self, name: &str) -> bool {
        self.first == name || self.second == name
    }

    /// The other spelling of the pair, if `name` is one of them
    pub fn other(&self, name: &str) -> Option<&str> {
        if self.first == name {
            Some(&self.second)
        } else if self.second == name {
            Some(&self.first)
        } else {
            None
        }
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct NearDuplicateDetector {
    /// Pairs at or below this edit distance are reported (default: 2)
    pub max_distance: usize,

    /// Names starting with any of these are left out of the comparison
    pub excluded_prefixes: Vec<String>,
}

impl NearDuplicateDetector {
    /// Create detector with the default threshold and no exclusions
    pub fn new() -> Self {
        NearDuplicateDetector {
            max_distance: crate::DEFAULT_MAX_DISTANCE,
            excluded_prefixes: Vec::new(),
        }
    }

    pub fn with_max_distance(max_distance: usize) -> Self {
        NearDuplicateDetector {
            max_distance,
            ..Self::new()
        }
    }

    /// Builder pattern: exclude aggregate rows (case-insensitive prefix)
    pub fn excluding(mut self, prefixes: &[String]) -> Self {
        self.excluded_prefixes = prefixes.iter().map(|p| p.to_lowercase()).collect();
        self
    }

    fn is_excluded(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.excluded_prefixes
            .iter()
            .any(|prefix| lower.starts_with(prefix.as_str()))
    }

    /// Find every pair of distinct names within `max_distance` edits
    ///
    /// Sorted by distance, then by names.
    pub fn detect<S: AsRef<str>>(&self, names: &[S]) -> Vec<NearDuplicate> {
        let distinct: Vec<&str> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| !self.is_excluded(n))
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .collect();

        let mut pairs = Vec::new();

        for i in 0..distinct.len() {
            for j in (i + 1)..distinct.len() {
                let distance = edit_distance(distinct[i], distinct[j]);
                if distance <= self.max_distance {
                    pairs.push(NearDuplicate::new(distinct[i], distinct[j], distance));
                }
            }
        }

        pairs.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.first.cmp(&b.first))
                .then_with(|| a.second.cmp(&b.second))
        });

        debug!(
            names = distinct.len(),
            pairs = pairs.len(),
            max_distance = self.max_distance,
            "near-duplicate scan"
        );

        pairs
    }
}

impl Default for NearDuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Levenshtein distance counted in characters, so "ä" vs "a" is one edit
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Detect near-duplicate pairs among names with the given threshold
pub fn detect_near_duplicates<S: AsRef<str>>(names: &[S], max_distance: usize) -> Vec<NearDuplicate> {
    NearDuplicateDetector::with_max_distance(max_distance).detect(names)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_counts_characters() {
        assert_eq!(edit_distance("Kaerjeng", "Käerjeng"), 1);
        assert_eq!(edit_distance("Pétange", "Petange"), 1);
        assert_eq!(edit_distance("Mamer", "Mamer"), 0);
        assert_eq!(edit_distance("", "Wiltz"), 5);
    }

    #[test]
    fn test_diacritic_pair_detected() {
        let pairs = detect_near_duplicates(&["Kaerjeng", "Käerjeng"], 2);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].first, "Kaerjeng");
        assert_eq!(pairs[0].second, "Käerjeng");
        assert_eq!(pairs[0].distance, 1);
    }

    #[test]
    fn test_pairs_above_threshold_not_reported() {
        let names = ["Mamer", "Mersch", "Wiltz", "Wintger", "Vianden"];
        let pairs = detect_near_duplicates(&names, 2);

        for pair in &pairs {
            assert!(edit_distance(&pair.first, &pair.second) <= 2);
        }
        assert!(!pairs.iter().any(|p| p.involves("Vianden")));
    }

    #[test]
    fn test_self_pairs_and_repeats_excluded() {
        // Same name repeated across years is one distinct name
        let pairs = detect_near_duplicates(&["Mamer", "Mamer", "Mamer"], 2);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_other_spelling() {
        let pair = NearDuplicate::new("Käerjeng", "Kaerjeng", 1);

        assert_eq!(pair.other("Kaerjeng"), Some("Käerjeng"));
        assert_eq!(pair.other("Käerjeng"), Some("Kaerjeng"));
        assert_eq!(pair.other("Kaerjeng-Nord"), None);
    }

    #[test]
    fn test_threshold_zero_reports_nothing() {
        let pairs = detect_near_duplicates(&["Kaerjeng", "Käerjeng"], 0);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_aggregate_rows_excluded() {
        let detector = NearDuplicateDetector::with_max_distance(3)
            .excluding(&["Pays".to_string(), "Source".to_string()]);

        // "Pays" is within 3 edits of "Parc"
        let pairs = detector.detect(&["Pays", "Parc", "source: STATEC"]);
        assert!(pairs.iter().all(|p| !p.involves("Pays")));
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_output_sorted_by_distance() {
        let pairs = detect_near_duplicates(&["Ell", "Eil", "Ellx", "Erpeldange"], 2);

        let distances: Vec<usize> = pairs.iter().map(|p| p.distance).collect();
        let mut sorted = distances.clone();
        sorted.sort();
        assert_eq!(distances, sorted);
        assert!(pairs.iter().any(|p| p.first == "Eil" && p.second == "Ell"));
    }
}
