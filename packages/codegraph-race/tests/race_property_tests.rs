//! Property-based tests for race detection
//!
//! Invariants that should hold for ALL inputs:
//! - Monotonicity: more accesses never lower the frequency factor
//! - Bucketing: a higher score never lands in a lower severity
//! - Order independence: factor combination ignores input order
//! - Determinism: the same project always yields the same report

mod common;

use codegraph_race::config::{Preset, RaceConfig, Validatable};
use codegraph_race::features::race_detection::{
    calculate_score_severity, combine_scores, FrequencyScorer,
};
use codegraph_race::RaceDetectionEngine;
use common::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_frequency_is_monotonic_and_bounded(count in 0usize..10_000) {
        let scorer = FrequencyScorer::default();
        let here = scorer.score(count);
        let next = scorer.score(count + 1);

        prop_assert!(next >= here);
        prop_assert!((0.5..=0.85).contains(&here));
    }

    #[test]
    fn prop_severity_is_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(calculate_score_severity(low) <= calculate_score_severity(high));
    }

    #[test]
    fn prop_combine_ignores_order(input in prop::collection::vec(0.0f64..=1.0, 1..8)) {
        let forward = combine_scores(&input);
        let mut scores = input.clone();
        scores.reverse();
        let backward = combine_scores(&scores);
        scores.rotate_left(1);
        let rotated = combine_scores(&scores);

        prop_assert_eq!(forward.to_bits(), backward.to_bits());
        prop_assert_eq!(forward.to_bits(), rotated.to_bits());
        prop_assert!((0.0..=1.0).contains(&forward));
    }

    #[test]
    fn prop_valid_caps_validate(cap in 1usize..=100_000, depth in 1usize..=64) {
        let config = RaceConfig::from_preset(Preset::Fast)
            .max_pairs_per_resource(cap)
            .max_caller_depth(depth);
        prop_assert!(config.validate().is_ok());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_pipeline_is_deterministic(workers in 1usize..6) {
        let engine = RaceDetectionEngine::default();
        let project = synthetic_project(workers);

        let first = engine.run_at(&project, fixed_time());
        let second = engine.run_at(&project, fixed_time());
        prop_assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

        for pair in first.races.windows(2) {
            prop_assert!(pair[0].risk_score >= pair[1].risk_score);
        }
        for race in &first.races {
            prop_assert!((0.0..=1.0).contains(&race.risk_score));
            prop_assert_eq!(race.severity, calculate_score_severity(race.risk_score));
        }
    }
}
