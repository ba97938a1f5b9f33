//! Built-in pipeline phases
//!
//! ## COLLECT
//! 1. Run the enabled trackers over every atom, dedupe accesses
//! 2. Recognize locks, lock coverage, lock orders and deadlocks
//! 3. Form conflicting pairs per resource (capped)
//! 4. Drop pairs proven sequential or mitigated by a released common lock
//!
//! A panic while scanning one atom or judging one pair is logged and confined
//! to that atom or pair; the rest of the project is still analyzed.
//!
//! ## ENRICH
//! Match patterns and score each surviving pair; order findings by risk.

use super::pipeline::{
    panic_message, AnalysisState, Candidate, PhaseContext, PipelinePhase, COLLECT, ENRICH,
};
use crate::errors::Result;
use crate::features::race_detection::domain::{
    Access, AccessScope, ConcurrencyVerdict, Lock, LockCoverage, LockProtection, Race, RacePair,
};
use crate::features::race_detection::infrastructure::explanation::{
    build_explanation, build_fix_suggestion,
};
use crate::features::race_detection::infrastructure::lock_analysis::{
    analyze_lock_coverage, collect_locks, detect_any, detect_deadlocks, detect_lock_order_cycles,
    extract_lock_order, pair_protection, LockIndex, PairLocking,
};
use crate::features::race_detection::infrastructure::patterns::{
    MatchContext, MatchOutcome, PatternMatcher,
};
use crate::features::race_detection::infrastructure::scoring::{Evidence, RiskScorer, ScoringInput};
use crate::features::race_detection::infrastructure::timing::{access_offset, TimingAnalyzer};
use crate::features::race_detection::infrastructure::trackers::{AccessTracker, Tracker};
use crate::shared::code_text::line_at;
use crate::shared::models::Atom;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

pub const STRATEGY_LOCK_ANALYSIS: &str = "lock-analysis";
pub const STRATEGY_TIMING: &str = "timing-analysis";
pub const STRATEGY_PATTERNS: &str = "pattern-matching";
pub const STRATEGY_SCORING: &str = "risk-scoring";
pub const STRATEGY_DEADLOCK_PAIRWISE: &str = "deadlock-pairwise";
pub const STRATEGY_DEADLOCK_CYCLES: &str = "deadlock-cycle-graph";

pub struct CollectPhase;

impl PipelinePhase for CollectPhase {
    fn name(&self) -> &str {
        COLLECT
    }

    fn run(&self, ctx: &PhaseContext<'_>, state: &mut AnalysisState) -> Result<usize> {
        let config = ctx.config;

        // 1. Trackers
        let trackers = Tracker::for_kinds(&config.enabled_trackers);
        let mut accesses = Vec::new();
        for atom in ctx.atoms {
            let found = isolated(
                || format!("atom {}", atom.id),
                || {
                    trackers
                        .iter()
                        .flat_map(|tracker| tracker.collect(atom))
                        .collect::<Vec<_>>()
                },
            );
            accesses.extend(found.unwrap_or_default());
        }
        let mut accesses = dedup_accesses(accesses);
        if !config.include_local_scope {
            let before = accesses.len();
            accesses.retain(|a| a.scope != AccessScope::Local);
            debug!("Dropped {} local-scope accesses", before - accesses.len());
        }
        accesses.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        state.trackers_used = accesses.iter().map(|a| a.tracker).collect();

        // 2. Locks, one atom at a time
        let lookup_fn = |id: &str| ctx.lookup.find_atom_by_id(id);
        let mut locks = LockIndex::new();
        let mut protected = 0usize;
        for group in atom_groups(&accesses) {
            let atom_id = group[0].atom_id.as_str();
            let scanned = isolated(
                || format!("lock scan of {atom_id}"),
                || collect_locks(group, lookup_fn),
            );
            let Some(index) = scanned else { continue };
            let group_locks: Vec<Lock> = index.iter().cloned().collect();
            protected += isolated(
                || format!("lock coverage of {atom_id}"),
                || analyze_lock_coverage(group, &group_locks, detect_any, lookup_fn).protected,
            )
            .unwrap_or(0);
            locks.merge(index);
        }
        state.locks = locks;
        state.lock_coverage = LockCoverage::from_counts(accesses.len(), protected);
        state.record_strategy(STRATEGY_LOCK_ANALYSIS);

        state.lock_orders = ctx
            .atoms
            .iter()
            .filter_map(|a| {
                isolated(|| format!("lock order of {}", a.id), || extract_lock_order(a)).flatten()
            })
            .collect();
        state.deadlocks = detect_deadlocks(&state.lock_orders);
        state.record_strategy(STRATEGY_DEADLOCK_PAIRWISE);
        if config.full_cycle_detection {
            state
                .deadlocks
                .extend(detect_lock_order_cycles(&state.lock_orders));
            state.record_strategy(STRATEGY_DEADLOCK_CYCLES);
        }

        // 3. Pairs per resource
        let mut by_resource: BTreeMap<&str, Vec<&Access>> = BTreeMap::new();
        for access in &accesses {
            by_resource
                .entry(access.resource_name.as_str())
                .or_default()
                .push(access);
        }
        state.access_counts = by_resource
            .iter()
            .map(|(resource, group)| (resource.to_string(), group.len()))
            .collect();

        // 4. Lock + timing filter
        let timing = TimingAnalyzer::new(ctx.lookup, config.max_caller_depth);
        let mut candidates = Vec::new();
        let (mut sequential, mut mitigated) = (0usize, 0usize);
        for (resource, group) in &by_resource {
            for pair in form_pairs(resource, group, config.max_pairs_per_resource) {
                let verdict = isolated(
                    || format!("timing of pair {}", pair.key()),
                    || timing.verdict(&pair.first, &pair.second),
                )
                .unwrap_or(ConcurrencyVerdict::Unknown);
                if !verdict.can_run_concurrently() {
                    debug!("Pair {} dropped: sequential", pair.key());
                    sequential += 1;
                    continue;
                }
                let locking = isolated(
                    || format!("lock check of pair {}", pair.key()),
                    || pair_protection(&pair, &state.locks),
                )
                .unwrap_or_else(PairLocking::unprotected);
                if locking.protection == LockProtection::Full && locking.released {
                    debug!("Pair {} dropped: mitigated by lock", pair.key());
                    mitigated += 1;
                    continue;
                }
                candidates.push(Candidate {
                    pair,
                    verdict,
                    locking,
                });
            }
        }
        if !by_resource.is_empty() {
            state.record_strategy(STRATEGY_TIMING);
        }

        info!(
            "COLLECT: {} accesses, {} locks, {} candidate pairs ({} sequential, {} mitigated)",
            accesses.len(),
            state.locks.len(),
            candidates.len(),
            sequential,
            mitigated
        );
        state.accesses = accesses;
        state.candidates = candidates;
        Ok(state.accesses.len())
    }
}

pub struct EnrichPhase;

impl PipelinePhase for EnrichPhase {
    fn name(&self) -> &str {
        ENRICH
    }

    fn skip_reason(&self, state: &AnalysisState) -> Option<String> {
        if state.candidates.is_empty() {
            Some("no candidate pairs".to_string())
        } else {
            None
        }
    }

    fn run(&self, ctx: &PhaseContext<'_>, state: &mut AnalysisState) -> Result<usize> {
        let timing = TimingAnalyzer::new(ctx.lookup, ctx.config.max_caller_depth);
        let matcher = PatternMatcher::new(ctx.registry);
        let scorer = RiskScorer::new(ctx.config);

        let mut races = Vec::new();
        for candidate in &state.candidates {
            let pair = &candidate.pair;
            let first_atom = ctx.lookup.find_atom_by_id(&pair.first.atom_id);
            let second_atom = ctx.lookup.find_atom_by_id(&pair.second.atom_id);

            let same_entry_point = timing.same_entry_point(&pair.first.atom_id, &pair.second.atom_id);
            let same_business_flow =
                timing.same_business_flow(&pair.first.atom_id, &pair.second.atom_id);

            let match_ctx = MatchContext {
                can_run_concurrently: candidate.verdict.can_run_concurrently(),
                same_business_flow,
                same_entry_point,
                has_common_lock: candidate.locking.has_common_lock,
                lock_protection: candidate.locking.protection,
                lock_released: candidate.locking.released,
                verdict: candidate.verdict,
                first_code: first_atom.map_or("", |a| a.code.as_str()),
                second_code: second_atom.map_or("", |a| a.code.as_str()),
                first_line: access_line(first_atom, &pair.first),
                second_line: access_line(second_atom, &pair.second),
            };

            let matched = match matcher.match_pair(pair, &match_ctx) {
                MatchOutcome::Matched(m) => m,
                MatchOutcome::Suppressed => continue,
                MatchOutcome::NoMatch => {
                    debug!("Pair {} matched no pattern", pair.key());
                    continue;
                }
            };

            let access_count = state
                .access_counts
                .get(pair.resource_name())
                .copied()
                .unwrap_or(2);
            let assessment = scorer.assess(
                &ScoringInput::for_pair(pair, access_count),
                &Evidence {
                    verdict: candidate.verdict,
                    same_entry_point,
                    same_business_flow,
                    downgraded: matched.downgraded,
                },
            );

            races.push(Race {
                id: String::new(),
                resource_name: pair.resource_name().to_string(),
                race_type: pair.race_type,
                first: pair.first.clone(),
                second: pair.second.clone(),
                explanation: build_explanation(pair, &match_ctx, &matched),
                fix_suggestion: build_fix_suggestion(pair.resource_name(), &matched, ctx.registry),
                primary_pattern: matched.primary,
                matched_patterns: matched.all,
                severity: assessment.severity,
                risk_score: assessment.score,
                confidence: assessment.confidence,
                testing_advice: assessment.testing_advice,
            });
        }
        state.record_strategy(STRATEGY_PATTERNS);
        state.record_strategy(STRATEGY_SCORING);

        order_races(&mut races);
        info!("ENRICH: {} races from {} candidates", races.len(), state.candidates.len());
        state.races = races;
        Ok(state.races.len())
    }
}

/// Run `f`, turning a panic into `None` and a warning naming `what`
fn isolated<T>(what: impl FnOnce() -> String, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            warn!("Skipping {}: panicked: {}", what(), panic_message(payload.as_ref()));
            None
        }
    }
}

/// Runs of consecutive accesses sharing an atom
fn atom_groups(accesses: &[Access]) -> Vec<&[Access]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=accesses.len() {
        if i == accesses.len() || accesses[i].atom_id != accesses[start].atom_id {
            groups.push(&accesses[start..i]);
            start = i;
        }
    }
    groups
}

/// First occurrence wins per (atom, resource, kind, position); trackers run
/// in a fixed order so the winner is stable.
fn dedup_accesses(accesses: Vec<Access>) -> Vec<Access> {
    let mut seen = BTreeSet::new();
    accesses
        .into_iter()
        .filter(|a| {
            seen.insert((
                a.atom_id.clone(),
                a.resource_name.clone(),
                a.kind,
                a.source_position,
            ))
        })
        .collect()
}

/// Conflicting pairs of a resource group, at most `cap`
fn form_pairs(resource: &str, group: &[&Access], cap: usize) -> Vec<RacePair> {
    let mut pairs = Vec::new();
    'outer: for (i, a) in group.iter().enumerate() {
        for b in &group[i + 1..] {
            if let Some(pair) = RacePair::new((*a).clone(), (*b).clone()) {
                if pairs.len() == cap {
                    warn!(
                        "Resource '{}' exceeds {} candidate pairs, truncated",
                        resource, cap
                    );
                    break 'outer;
                }
                pairs.push(pair);
            }
        }
    }
    pairs
}

fn access_line<'a>(atom: Option<&'a Atom>, access: &Access) -> &'a str {
    atom.and_then(|atom| access_offset(atom, access).map(|offset| line_at(&atom.code, offset)))
        .unwrap_or("")
}

/// Risk descending, then pair identity; ids assigned after sorting
fn order_races(races: &mut [Race]) {
    races.sort_by(|a, b| {
        b.risk_score
            .total_cmp(&a.risk_score)
            .then_with(|| a.resource_name.cmp(&b.resource_name))
            .then_with(|| a.first.id.cmp(&b.first.id))
            .then_with(|| a.second.id.cmp(&b.second.id))
    });
    for (i, race) in races.iter_mut().enumerate() {
        race.id = format!("race-{:04}", i + 1);
    }
}
