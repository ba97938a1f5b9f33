//! Error types for codegraph-race
//!
//! None of these abort a run. Trackers and detectors swallow malformed input,
//! missing atoms are skipped, and a failed phase is recorded in the report.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for race detection operations
#[derive(Debug, Error)]
pub enum RaceError {
    /// Atom lookup returned nothing (callers skip, never fail)
    #[error("Atom not found: {0}")]
    MissingAtom(String),

    /// Timing or lock evidence insufficient to decide
    #[error("Ambiguous context: {0}")]
    AmbiguousContext(String),

    /// A tracker or detector could not parse a snippet
    #[error("Malformed input in {item}: {reason}")]
    MalformedInput { item: String, reason: String },

    /// Pattern name already registered
    #[error("Pattern '{0}' is already registered")]
    DuplicatePattern(String),

    /// Phase name not present in the pipeline order
    #[error("Unknown pipeline phase '{0}'")]
    UnknownPhase(String),

    /// Phase name already present in the pipeline order
    #[error("Pipeline phase '{0}' is already registered")]
    DuplicatePhase(String),

    /// A phase returned an error (recorded, run continues)
    #[error("Phase {phase} failed: {reason}")]
    PhaseFailed { phase: String, reason: String },

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Report serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RaceError {
    /// Create a malformed input error
    pub fn malformed(item: impl Into<String>, reason: impl Into<String>) -> Self {
        RaceError::MalformedInput {
            item: item.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only affects a single item (atom, pair, predicate)
    pub fn is_item_local(&self) -> bool {
        matches!(
            self,
            RaceError::MissingAtom(_)
                | RaceError::AmbiguousContext(_)
                | RaceError::MalformedInput { .. }
        )
    }
}

/// Result type alias for race detection operations
pub type Result<T> = std::result::Result<T, RaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting() {
        let err = RaceError::malformed("atom:handler", "unterminated string literal");
        let msg = err.to_string();
        assert!(msg.contains("atom:handler"));
        assert!(msg.contains("unterminated"));
    }

    #[test]
    fn test_item_local_classification() {
        assert!(RaceError::MissingAtom("a".into()).is_item_local());
        assert!(RaceError::AmbiguousContext("no callers".into()).is_item_local());
        assert!(!RaceError::DuplicatePattern("check-then-act".into()).is_item_local());
        assert!(!RaceError::UnknownPhase("LINT".into()).is_item_local());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: RaceError = ConfigError::UnknownPreset("ultra".to_string()).into();
        assert!(err.to_string().contains("ultra"));
    }
}
