// ⚠️ Reconciliation errors
// Only conditions that make a partition meaningless are errors.
// Unresolved names are data, not errors (see ReconciliationReport).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconError {
    /// The reference lists produced no canonical names at all
    #[error("canonical name set is empty: reference lists returned no names")]
    EmptyCanonicalSet,

    /// A rule's replacement is picked up again by another rule,
    /// so applying the table twice would not be a no-op
    #[error("override '{rule_id}' produces '{replacement}', which rule '{retriggered_by}' rewrites again")]
    UnstableOverride {
        rule_id: String,
        replacement: String,
        retriggered_by: String,
    },

    #[error("override '{rule_id}' is invalid: {reason}")]
    InvalidRule { rule_id: String, reason: String },
}

pub type ReconResult<T> = std::result::Result<T, ReconError>;
