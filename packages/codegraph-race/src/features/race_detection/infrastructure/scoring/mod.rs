//! Risk scoring
//!
//! ```text
//! ScoringInput ──► Frequency ─┐
//!              ──► Scope     ─┼──► mean ──► [downgrade] ──► severity ──► TestingAdvice
//!              ──► Type      ─┘
//! ```

pub mod advisor;
pub mod factors;
pub mod severity;

pub use advisor::TestingAdvisor;
pub use factors::{
    combine_scores, FactorScorer, FrequencyScorer, ScopeScorer, ScoringInput, TypeScorer,
    NEUTRAL_SCORE,
};
pub use severity::{calculate_score_severity, severity_with_thresholds};

use crate::config::{RaceConfig, SeverityThresholds};
use crate::features::race_detection::domain::{
    ConcurrencyVerdict, Confidence, Severity, TestingAdvice,
};

/// Scored finding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    pub severity: Severity,
    pub confidence: Confidence,
    pub testing_advice: TestingAdvice,
}

/// Evidence behind the confidence of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evidence {
    pub verdict: ConcurrencyVerdict,
    pub same_entry_point: bool,
    pub same_business_flow: bool,
    pub downgraded: bool,
}

impl Evidence {
    /// High when concurrency is proven, medium when an ambiguous pair shares
    /// an entry point or business flow, low otherwise or when downgraded.
    pub fn confidence(&self) -> Confidence {
        if self.downgraded {
            return Confidence::Low;
        }
        match self.verdict {
            ConcurrencyVerdict::Concurrent => Confidence::High,
            _ if self.same_entry_point || self.same_business_flow => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskScorer {
    factors: Vec<FactorScorer>,
    thresholds: SeverityThresholds,
    downgrade_factor: f64,
    advisor: TestingAdvisor,
}

impl RiskScorer {
    pub fn new(config: &RaceConfig) -> Self {
        Self {
            factors: vec![
                FactorScorer::Frequency(FrequencyScorer::new(config.frequency)),
                FactorScorer::Scope(ScopeScorer),
                FactorScorer::Type(TypeScorer),
            ],
            thresholds: config.severity_thresholds,
            downgrade_factor: config.downgrade_factor,
            advisor: TestingAdvisor,
        }
    }

    pub fn factors(&self) -> &[FactorScorer] {
        &self.factors
    }

    /// Combined factor score in [0, 1]
    pub fn score(&self, input: &ScoringInput) -> f64 {
        let scores: Vec<f64> = self.factors.iter().map(|f| f.score(input)).collect();
        combine_scores(&scores)
    }

    pub fn severity(&self, score: f64) -> Severity {
        severity_with_thresholds(score, &self.thresholds)
    }

    pub fn assess(&self, input: &ScoringInput, evidence: &Evidence) -> RiskAssessment {
        let mut score = self.score(input);
        if evidence.downgraded {
            score *= self.downgrade_factor;
        }
        let severity = self.severity(score);
        RiskAssessment {
            score,
            severity,
            confidence: evidence.confidence(),
            testing_advice: self.advisor.advise(severity),
        }
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(&RaceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::race_detection::domain::{AccessScope, RaceType, TestPriority};

    fn evidence(verdict: ConcurrencyVerdict) -> Evidence {
        Evidence {
            verdict,
            same_entry_point: false,
            same_business_flow: false,
            downgraded: false,
        }
    }

    #[test]
    fn test_global_write_write_is_high() {
        let scorer = RiskScorer::default();
        let input = ScoringInput {
            access_count: 2,
            scope: Some(AccessScope::Global),
            race_type: Some(RaceType::WriteWrite),
        };
        let assessment = scorer.assess(&input, &evidence(ConcurrencyVerdict::Concurrent));
        assert!((assessment.score - (0.5 + 0.9 + 0.9) / 3.0).abs() < 1e-12);
        assert_eq!(assessment.severity, Severity::High);
        assert_eq!(assessment.confidence, Confidence::High);
        assert_eq!(assessment.testing_advice.priority, TestPriority::P1);
    }

    #[test]
    fn test_hot_resource_reaches_critical() {
        let scorer = RiskScorer::default();
        let input = ScoringInput {
            access_count: 50,
            scope: Some(AccessScope::Global),
            race_type: Some(RaceType::WriteWrite),
        };
        assert_eq!(scorer.severity(scorer.score(&input)), Severity::Critical);
    }

    #[test]
    fn test_downgrade_lowers_score_and_confidence() {
        let scorer = RiskScorer::default();
        let input = ScoringInput {
            access_count: 2,
            scope: Some(AccessScope::Global),
            race_type: Some(RaceType::ReadWrite),
        };
        let plain = scorer.assess(&input, &evidence(ConcurrencyVerdict::Concurrent));
        let mut downgraded_evidence = evidence(ConcurrencyVerdict::Concurrent);
        downgraded_evidence.downgraded = true;
        let downgraded = scorer.assess(&input, &downgraded_evidence);

        assert!(downgraded.score < plain.score);
        assert_eq!(downgraded.confidence, Confidence::Low);
    }

    #[test]
    fn test_confidence_from_evidence() {
        assert_eq!(evidence(ConcurrencyVerdict::Unknown).confidence(), Confidence::Low);
        let mut e = evidence(ConcurrencyVerdict::Unknown);
        e.same_entry_point = true;
        assert_eq!(e.confidence(), Confidence::Medium);
    }
}
