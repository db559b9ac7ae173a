// 🏷️ Override Rules - Corrections as Data
// Ordered pattern → replacement table for known spelling divergences
// between the dataset's source and the canonical reference lists.

use crate::error::{ReconError, ReconResult};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::debug;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// How a rule's pattern is tested against a raw name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Whole name equals the pattern
    #[default]
    Exact,

    /// Name starts with the pattern
    Prefix,

    /// Pattern occurs anywhere in the name
    Contains,

    /// `*` matches any run of characters, `?` exactly one
    Glob,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Prefix => "prefix",
            MatchKind::Contains => "contains",
            MatchKind::Glob => "glob",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    /// Rule ID for tracking
    pub id: String,

    /// Pattern tested against the raw name (case-sensitive)
    pub pattern: String,

    #[serde(default, rename = "match")]
    pub kind: MatchKind,

    /// Canonical spelling written in place of the raw name
    pub replacement: String,

    /// Why this rule exists (e.g. "diacritic lost in source export")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OverrideRule {
    pub fn new(id: &str, kind: MatchKind, pattern: &str, replacement: &str) -> Self {
        OverrideRule {
            id: id.to_string(),
            pattern: pattern.to_string(),
            kind,
            replacement: replacement.to_string(),
            description: None,
        }
    }

    /// Shorthand for the common whole-name correction
    pub fn exact(id: &str, pattern: &str, replacement: &str) -> Self {
        Self::new(id, MatchKind::Exact, pattern, replacement)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Check if pattern matches the given name
    pub fn matches(&self, name: &str) -> bool {
        match self.kind {
            MatchKind::Exact => name == self.pattern,
            MatchKind::Prefix => name.starts_with(&self.pattern),
            MatchKind::Contains => name.contains(&self.pattern),
            MatchKind::Glob => {
                let pattern: Vec<char> = self.pattern.chars().collect();
                let text: Vec<char> = name.chars().collect();
                glob_match(&pattern, &text)
            }
        }
    }

    fn validate(&self) -> ReconResult<()> {
        if self.pattern.is_empty() {
            return Err(ReconError::InvalidRule {
                rule_id: self.id.clone(),
                reason: "pattern is empty".to_string(),
            });
        }
        if self.replacement.trim().is_empty() {
            return Err(ReconError::InvalidRule {
                rule_id: self.id.clone(),
                reason: "replacement is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Wildcard matching with backtracking on the last `*`
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}

// ============================================================================
// OVERRIDE HIT
// ============================================================================

/// One substitution performed by the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideHit {
    /// Position of the name in the input sequence
    pub index: usize,
    pub raw: String,
    pub corrected: String,
    pub rule_id: String,
}

// ============================================================================
// OVERRIDE TABLE
// ============================================================================

/// Ordered rule table. First matching rule wins.
///
/// A table can only be built if it is stable: running any rule's replacement
/// through the table returns that replacement unchanged. That makes
/// `apply` idempotent for every input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTable {
    rules: Vec<OverrideRule>,
}

impl OverrideTable {
    /// Create an empty table (every name passes through)
    pub fn empty() -> Self {
        OverrideTable { rules: Vec::new() }
    }

    /// Create table from rules, keeping declaration order
    pub fn new(rules: Vec<OverrideRule>) -> ReconResult<Self> {
        for rule in &rules {
            rule.validate()?;
        }

        let table = OverrideTable { rules };
        table.check_stable()?;
        Ok(table)
    }

    /// Load rules from a JSON array file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<OverrideRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        let table = OverrideTable::new(rules)?;
        debug!(rules = table.len(), "loaded override table");
        Ok(table)
    }

    fn check_stable(&self) -> ReconResult<()> {
        for rule in &self.rules {
            if let Some(other) = self.first_match(&rule.replacement) {
                if other.replacement != rule.replacement {
                    return Err(ReconError::UnstableOverride {
                        rule_id: rule.id.clone(),
                        replacement: rule.replacement.clone(),
                        retriggered_by: other.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn first_match(&self, name: &str) -> Option<&OverrideRule> {
        self.rules.iter().find(|rule| rule.matches(name))
    }

    /// Correct a single name
    pub fn correct<'a>(&'a self, name: &'a str) -> &'a str {
        match self.first_match(name) {
            Some(rule) => &rule.replacement,
            None => name,
        }
    }

    /// Apply rules to every name, preserving order
    pub fn apply<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names
            .iter()
            .map(|name| self.correct(name.as_ref()).to_string())
            .collect()
    }

    /// Same as `apply`, also reporting which rule rewrote which position
    ///
    /// A rule whose replacement equals the raw name is not reported.
    pub fn apply_traced<S: AsRef<str>>(&self, names: &[S]) -> (Vec<String>, Vec<OverrideHit>) {
        let mut corrected = Vec::with_capacity(names.len());
        let mut hits = Vec::new();

        for (index, name) in names.iter().enumerate() {
            let raw = name.as_ref();
            match self.first_match(raw) {
                Some(rule) if rule.replacement != raw => {
                    hits.push(OverrideHit {
                        index,
                        raw: raw.to_string(),
                        corrected: rule.replacement.clone(),
                        rule_id: rule.id.clone(),
                    });
                    corrected.push(rule.replacement.clone());
                }
                _ => corrected.push(raw.to_string()),
            }
        }

        (corrected, hits)
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// SHA-256 over the ordered rule list, for auditing which table produced a report
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for rule in &self.rules {
            hasher.update(format!(
                "{}\u{1f}{}\u{1f}{}\u{1f}{}\n",
                rule.id,
                rule.kind.as_str(),
                rule.pattern,
                rule.replacement
            ));
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Apply an ordered rule table to names (first matching rule wins)
pub fn apply_overrides<S: AsRef<str>>(names: &[S], table: &OverrideTable) -> Vec<String> {
    table.apply(names)
}

// ============================================================================
// TESTS
// ============================================================================
