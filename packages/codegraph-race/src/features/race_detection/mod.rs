pub mod application;
/// Race Detection Feature
///
/// Heuristic race condition detection over JS/TS atoms.
///
/// ## Features
/// - **Access Tracking**: closure variables, lazy singletons, external resources
/// - **Lock Analysis**: explicit, monitor, atomic and transactional locks; coverage;
///   pairwise deadlocks and opt-in lock-order cycles (Tarjan's SCC)
/// - **Timing Analysis**: await-chain ordering vs fan-out; fail-open when unsure
/// - **Pattern Matching**: specificity-ordered registry with custom predicates
/// - **Risk Scoring**: frequency, scope and type factors; severity; testing advice
///
/// ## Architecture
/// - **Domain**: Access, Lock, RacePair, Race, Summary, RaceReport
/// - **Infrastructure**: trackers, lock_analysis, timing, patterns, scoring
/// - **Application**: phase pipeline and `RaceDetectionEngine`
/// - **Ports**: `AtomLookup`, `RaceAnalyzerPort`
pub mod domain;
pub mod infrastructure;
pub mod ports;

// Re-export application layer (primary interface)
pub use application::*;

// Re-export domain types
pub use domain::*;

// Re-export infrastructure (internal use - prefer application layer)
#[doc(hidden)]
pub use infrastructure::*;

pub use ports::*;
