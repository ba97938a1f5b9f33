/// Independent risk factors
///
/// Each factor maps one property of a pair to [0, 1]. Missing or invalid
/// input falls back to a neutral 0.5.
use crate::config::FrequencyCurve;
use crate::features::race_detection::domain::{AccessScope, RacePair, RaceType};

pub const NEUTRAL_SCORE: f64 = 0.5;

/// What the factors look at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringInput {
    /// Accesses to the resource across the project
    pub access_count: usize,
    pub scope: Option<AccessScope>,
    pub race_type: Option<RaceType>,
}

impl ScoringInput {
    /// Widest scope of the two accesses
    pub fn for_pair(pair: &RacePair, access_count: usize) -> Self {
        Self {
            access_count,
            scope: Some(pair.first.scope.min(pair.second.scope)),
            race_type: Some(pair.race_type),
        }
    }
}

/// Hot resources are riskier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyScorer {
    curve: FrequencyCurve,
}

impl FrequencyScorer {
    pub fn new(curve: FrequencyCurve) -> Self {
        Self { curve }
    }

    /// Baseline up to two accesses, then `step` per extra access up to `max`
    pub fn score(&self, access_count: usize) -> f64 {
        if access_count <= 2 {
            return self.curve.baseline;
        }
        let extra = (access_count - 2) as f64;
        (self.curve.baseline + self.curve.step * extra).min(self.curve.max)
    }
}

impl Default for FrequencyScorer {
    fn default() -> Self {
        Self::new(FrequencyCurve::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeScorer;

impl ScopeScorer {
    pub fn score(&self, scope: Option<AccessScope>) -> f64 {
        match scope {
            Some(AccessScope::Global) => 0.9,
            Some(AccessScope::Instance) => 0.7,
            Some(AccessScope::Local) => 0.3,
            None => NEUTRAL_SCORE,
        }
    }

    /// Score a scope label; unknown labels are neutral
    pub fn score_label(&self, label: &str) -> f64 {
        let scope = match label.to_ascii_lowercase().as_str() {
            "global" => Some(AccessScope::Global),
            "instance" => Some(AccessScope::Instance),
            "local" => Some(AccessScope::Local),
            _ => None,
        };
        self.score(scope)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeScorer;

impl TypeScorer {
    pub fn score(&self, race_type: Option<RaceType>) -> f64 {
        match race_type {
            Some(RaceType::WriteWrite) => 0.9,
            Some(RaceType::ReadWrite) => 0.6,
            None => NEUTRAL_SCORE,
        }
    }
}

/// Closed set of factors combined by the risk scorer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FactorScorer {
    Frequency(FrequencyScorer),
    Scope(ScopeScorer),
    Type(TypeScorer),
}

impl FactorScorer {
    pub fn name(&self) -> &'static str {
        match self {
            FactorScorer::Frequency(_) => "frequency",
            FactorScorer::Scope(_) => "scope",
            FactorScorer::Type(_) => "type",
        }
    }

    pub fn score(&self, input: &ScoringInput) -> f64 {
        let raw = match self {
            FactorScorer::Frequency(f) => f.score(input.access_count),
            FactorScorer::Scope(s) => s.score(input.scope),
            FactorScorer::Type(t) => t.score(input.race_type),
        };
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            NEUTRAL_SCORE
        }
    }
}

/// Mean of the factor scores
///
/// Scores are sorted before summing so any permutation gives the same bits.
pub fn combine_scores(scores: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let sum: f64 = sorted.iter().sum();
    (sum / sorted.len() as f64).clamp(0.0, 1.0)
}
