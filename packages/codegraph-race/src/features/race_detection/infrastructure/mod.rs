//! Race detection infrastructure
//!
//! - `trackers`: atoms to accesses
//! - `lock_analysis`: locks, coverage, pair mitigation, deadlocks
//! - `timing`: can two accesses overlap
//! - `patterns`: named bug shapes over pairs
//! - `scoring`: risk score, severity, testing advice

pub mod explanation;
pub mod lock_analysis;
pub mod patterns;
pub mod scoring;
pub mod timing;
pub mod trackers;

pub use explanation::{build_explanation, build_fix_suggestion};
pub use lock_analysis::{
    analyze_lock_coverage, check_mitigation, collect_locks, detect_all, detect_any,
    detect_deadlocks, detect_lock_order_cycles, determine_scope, extract_lock_order,
    pair_protection, LockIndex, PairLocking,
};
pub use patterns::{
    BuiltinPattern, MatchContext, MatchOutcome, PatternInfo, PatternMatch, PatternMatcher,
    PatternRegistry,
};
pub use scoring::{
    calculate_score_severity, combine_scores, Evidence, FrequencyScorer, RiskAssessment,
    RiskScorer, ScoringInput, TestingAdvisor,
};
pub use timing::TimingAnalyzer;
pub use trackers::{AccessTracker, Tracker};
