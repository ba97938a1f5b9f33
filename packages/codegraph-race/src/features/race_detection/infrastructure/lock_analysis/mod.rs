//! Lock / mitigation analysis
//!
//! ```text
//! atoms ──► detectors (explicit, monitor, atomic, transaction) ──► LockIndex
//!   │                                                               │
//!   │                                          coverage, pair protection
//!   └──► lock orders ──► pairwise check (+ optional SCC cycle search) ──► Deadlock
//! ```

pub mod coverage;
pub mod deadlock;
pub mod detectors;
pub mod scope;

pub use coverage::{
    analyze_lock_coverage, check_mitigation, collect_locks, pair_protection, LockIndex,
    PairLocking,
};
pub use deadlock::{detect_deadlocks, detect_lock_order_cycles, extract_lock_order};
pub use detectors::{detect_all, detect_any};
pub use scope::determine_scope;
