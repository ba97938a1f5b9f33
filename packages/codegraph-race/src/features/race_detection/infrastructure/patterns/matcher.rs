/// Pattern matching over race pairs
///
/// ## Decision
/// 1. Full protection by a common, released lock: suppressed
/// 2. Full protection by a common lock without release: matched, downgraded
/// 3. Otherwise every pattern is evaluated in registry order; the first hit
///    is primary, the rest are secondary. No hit, no finding.
use super::registry::PatternRegistry;
use crate::features::race_detection::domain::{ConcurrencyVerdict, LockProtection, RacePair};
use tracing::debug;

/// Evidence assembled for one pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchContext<'a> {
    pub can_run_concurrently: bool,
    pub same_business_flow: bool,
    pub same_entry_point: bool,
    pub has_common_lock: bool,
    pub lock_protection: LockProtection,
    /// A common lock is released everywhere it is taken
    pub lock_released: bool,
    pub verdict: ConcurrencyVerdict,
    /// Code of the atom holding `pair.first`
    pub first_code: &'a str,
    pub second_code: &'a str,
    /// Source line of `pair.first`
    pub first_line: &'a str,
    pub second_line: &'a str,
}

impl<'a> MatchContext<'a> {
    /// No ordering proof, no locks, no code
    pub fn concurrent() -> Self {
        Self {
            can_run_concurrently: true,
            same_business_flow: false,
            same_entry_point: false,
            has_common_lock: false,
            lock_protection: LockProtection::Unprotected,
            lock_released: false,
            verdict: ConcurrencyVerdict::Unknown,
            first_code: "",
            second_code: "",
            first_line: "",
            second_line: "",
        }
    }

    pub fn with_code(mut self, first: &'a str, second: &'a str) -> Self {
        self.first_code = first;
        self.second_code = second;
        self
    }

    pub fn with_lines(mut self, first: &'a str, second: &'a str) -> Self {
        self.first_line = first;
        self.second_line = second;
        self
    }

    pub fn with_verdict(mut self, verdict: ConcurrencyVerdict) -> Self {
        self.verdict = verdict;
        self.can_run_concurrently = verdict.can_run_concurrently();
        self
    }

    fn fully_locked(&self) -> bool {
        self.has_common_lock && self.lock_protection == LockProtection::Full
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub primary: String,
    /// Primary first
    pub all: Vec<String>,
    /// Lock held but never released
    pub downgraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(PatternMatch),
    /// Safe by locking
    Suppressed,
    NoMatch,
}

impl MatchOutcome {
    pub fn matched(self) -> Option<PatternMatch> {
        match self {
            MatchOutcome::Matched(m) => Some(m),
            _ => None,
        }
    }
}

pub struct PatternMatcher<'r> {
    registry: &'r PatternRegistry,
}

impl<'r> PatternMatcher<'r> {
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self { registry }
    }

    pub fn match_pair(&self, pair: &RacePair, ctx: &MatchContext<'_>) -> MatchOutcome {
        if ctx.fully_locked() && ctx.lock_released {
            debug!("Pair {} suppressed: common released lock", pair.key());
            return MatchOutcome::Suppressed;
        }

        let all: Vec<String> = self
            .registry
            .patterns()
            .iter()
            .filter(|pattern| pattern.evaluate(pair, ctx))
            .map(|pattern| pattern.name().to_string())
            .collect();

        let Some(primary) = all.first().cloned() else {
            return MatchOutcome::NoMatch;
        };

        MatchOutcome::Matched(PatternMatch {
            primary,
            all,
            downgraded: ctx.fully_locked(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::race_detection::domain::{Access, AccessKind, TrackerKind};
    use pretty_assertions::assert_eq;

    fn pair(a: AccessKind, b: AccessKind) -> RacePair {
        RacePair::new(
            Access::new("inc", "count", a, TrackerKind::Closure).at(1, 1).with_id("inc#0"),
            Access::new("reset", "count", b, TrackerKind::Closure).at(5, 1).with_id("reset#0"),
        )
        .unwrap()
    }

    #[test]
    fn test_primary_and_secondary_matches() {
        let registry = PatternRegistry::with_builtins();
        let matcher = PatternMatcher::new(&registry);
        let ctx = MatchContext::concurrent().with_code("count++;", "count = 0;");

        let m = matcher
            .match_pair(&pair(AccessKind::Write, AccessKind::Write), &ctx)
            .matched()
            .unwrap();
        assert_eq!(m.primary, "counter-increment");
        assert_eq!(m.all, vec!["counter-increment", "write-write-conflict"]);
        assert!(!m.downgraded);
    }

    #[test]
    fn test_released_common_lock_suppresses() {
        let registry = PatternRegistry::with_builtins();
        let matcher = PatternMatcher::new(&registry);
        let mut ctx = MatchContext::concurrent();
        ctx.has_common_lock = true;
        ctx.lock_protection = LockProtection::Full;
        ctx.lock_released = true;

        assert_eq!(
            matcher.match_pair(&pair(AccessKind::Write, AccessKind::Read), &ctx),
            MatchOutcome::Suppressed
        );
    }

    #[test]
    fn test_unreleased_common_lock_downgrades() {
        let registry = PatternRegistry::with_builtins();
        let matcher = PatternMatcher::new(&registry);
        let mut ctx = MatchContext::concurrent();
        ctx.has_common_lock = true;
        ctx.lock_protection = LockProtection::Full;
        ctx.lock_released = false;

        let m = matcher
            .match_pair(&pair(AccessKind::Write, AccessKind::Read), &ctx)
            .matched()
            .unwrap();
        assert_eq!(m.primary, "unreleased-lock");
        assert!(m.downgraded);
    }

    #[test]
    fn test_sequential_pair_has_no_match() {
        let registry = PatternRegistry::with_builtins();
        let matcher = PatternMatcher::new(&registry);
        let ctx = MatchContext::concurrent().with_verdict(ConcurrencyVerdict::Sequential);
        assert_eq!(
            matcher.match_pair(&pair(AccessKind::Write, AccessKind::Write), &ctx),
            MatchOutcome::NoMatch
        );
    }

    #[test]
    fn test_custom_pattern_is_sole_match() {
        let mut registry = PatternRegistry::with_builtins();
        registry
            .register("reset-during-increment", "reset races an increment", |pair, _| {
                pair.second.atom_id == "reset"
            })
            .unwrap();
        let matcher = PatternMatcher::new(&registry);
        let ctx = MatchContext::concurrent().with_verdict(ConcurrencyVerdict::Sequential);

        let m = matcher
            .match_pair(&pair(AccessKind::Write, AccessKind::Write), &ctx)
            .matched()
            .unwrap();
        assert_eq!(m.all, vec!["reset-during-increment"]);
        assert_eq!(m.primary, "reset-during-increment");
    }
}
