//! Race pattern matching
//!
//! ```text
//! RacePair + MatchContext ──► PatternMatcher ──► registry (by specificity)
//!                                                  ├── BuiltinPattern::*
//!                                                  └── custom predicates
//! ```

pub mod builtin;
pub mod matcher;
pub mod registry;

pub use builtin::BuiltinPattern;
pub use matcher::{MatchContext, MatchOutcome, PatternMatch, PatternMatcher};
pub use registry::{
    Pattern, PatternInfo, PatternKind, PatternPredicate, PatternRegistry, CUSTOM_SPECIFICITY,
};
