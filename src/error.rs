//! Error types for the topology engine.
//!
//! Only conditions that make a result meaningless are errors. Inconsistencies
//! in the network itself (duplicate addresses, orphan links, ...) are reported
//! as [`crate::finding::Finding`] values instead.

/// Fatal errors raised while building a [`crate::topology::Topology`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("Malformed {record} record: field '{field}' {reason}")]
    Schema {
        record: String,
        field: String,
        reason: String,
    },

    #[error("Duplicate device id: {id}")]
    DuplicateDevice { id: String },

    #[error("Duplicate link: {id}")]
    DuplicateLink { id: String },

    #[error(transparent)]
    Invariant(#[from] ModelInvariantViolation),
}

impl BuildError {
    pub(crate) fn schema(record: impl Into<String>, field: &str, reason: impl Into<String>) -> Self {
        BuildError::Schema {
            record: record.into(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors that abort a single simulation call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScenarioError {
    #[error("Scenario target not found: {kind} '{id}'")]
    TargetNotFound { kind: &'static str, id: String },

    #[error("Link '{key}' is ambiguous, candidates: {}", candidates.join(", "))]
    AmbiguousLink { key: String, candidates: Vec<String> },

    #[error("Traffic volume must be positive, got {0}")]
    InvalidVolume(u64),
}

/// An internal model invariant does not hold.
///
/// This indicates a defect in the builder or in a patch applied to a working
/// copy, never a property of the input network.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Model invariant violated: {reason}")]
pub struct ModelInvariantViolation {
    pub reason: String,
}

impl ModelInvariantViolation {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Out-of-range analysis configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
