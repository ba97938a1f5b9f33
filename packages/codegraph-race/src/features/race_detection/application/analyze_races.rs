//! Race Analysis Use Case
//!
//! Entry point hosts call with a project model (or any [`AtomLookup`]).
//!
//! ## Algorithm
//! 1. COLLECT: trackers, locks, candidate pairs, lock + timing filter
//! 2. ENRICH: pattern matching, risk scoring
//! 3. SUMMARY: counts, trackers and strategies exercised
//!
//! ## Performance
//! - Time: O(A + P × D) where A = accesses, P = pairs (capped per resource),
//!   D = caller depth walked by the timing analyzer
//! - Single-threaded and deterministic: same atoms, config and registry give
//!   the same report (with the same `analyzed_at`)

use super::pipeline::{PhaseContext, PhasePipeline, PipelinePhase};
use crate::config::{RaceConfig, Validatable};
use crate::errors::Result;
use crate::features::race_detection::domain::{RacePair, RaceReport};
use crate::features::race_detection::infrastructure::patterns::{MatchContext, PatternRegistry};
use crate::features::race_detection::ports::{AtomLookup, RaceAnalyzerPort};
use crate::shared::models::{Atom, ProjectModel};
use chrono::{DateTime, Utc};
use tracing::info;

pub struct RaceDetectionEngine {
    config: RaceConfig,
    registry: PatternRegistry,
    pipeline: PhasePipeline,
}

impl RaceDetectionEngine {
    /// Engine with built-in patterns and phases; the config is validated
    pub fn new(config: RaceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: PatternRegistry::with_builtins(),
            pipeline: PhasePipeline::with_default_phases(),
        })
    }

    /// Replace the pattern registry
    pub fn with_registry(mut self, registry: PatternRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Register a custom pattern (default specificity)
    pub fn register_pattern<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        predicate: F,
    ) -> Result<()>
    where
        F: Fn(&RacePair, &MatchContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.registry.register(name, description, predicate)
    }

    pub fn insert_phase_before(
        &mut self,
        anchor: &str,
        phase: Box<dyn PipelinePhase>,
    ) -> Result<()> {
        self.pipeline.insert_phase_before(anchor, phase)
    }

    pub fn insert_phase_after(
        &mut self,
        anchor: &str,
        phase: Box<dyn PipelinePhase>,
    ) -> Result<()> {
        self.pipeline.insert_phase_after(anchor, phase)
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.pipeline.phase_names()
    }

    /// Analyze a project, stamped with the current time
    pub fn run(&self, project: &ProjectModel) -> RaceReport {
        self.run_at(project, Utc::now())
    }

    /// Analyze a project with a fixed `analyzed_at`
    pub fn run_at(&self, project: &ProjectModel, analyzed_at: DateTime<Utc>) -> RaceReport {
        let index = project.index();
        let atoms: Vec<&Atom> = project.atoms().collect();
        self.analyze(&index, &atoms, analyzed_at)
    }

    /// Analyze `atoms` against an external lookup
    pub fn analyze(
        &self,
        lookup: &dyn AtomLookup,
        atoms: &[&Atom],
        analyzed_at: DateTime<Utc>,
    ) -> RaceReport {
        info!(
            "Race analysis: {} atoms, preset {:?}, {} patterns",
            atoms.len(),
            self.config.preset,
            self.registry.len()
        );
        let ctx = PhaseContext {
            lookup,
            atoms,
            config: &self.config,
            registry: &self.registry,
        };
        let output = self.pipeline.run(&ctx, analyzed_at);

        RaceReport {
            summary: output.summary,
            races: output.state.races,
            deadlocks: output.state.deadlocks,
            lock_coverage: output.state.lock_coverage,
            phases: output.phases,
        }
    }
}

impl Default for RaceDetectionEngine {
    fn default() -> Self {
        Self {
            config: RaceConfig::default(),
            registry: PatternRegistry::with_builtins(),
            pipeline: PhasePipeline::with_default_phases(),
        }
    }
}

impl RaceAnalyzerPort for RaceDetectionEngine {
    fn analyze_project(&self, project: &ProjectModel) -> Result<RaceReport> {
        Ok(self.run(project))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RaceError;

    #[test]
    fn test_invalid_config_rejected() {
        let config = RaceConfig::default().downgrade_factor(0.0);
        assert!(matches!(
            RaceDetectionEngine::new(config),
            Err(RaceError::Config(_))
        ));
    }

    #[test]
    fn test_empty_project() {
        let engine = RaceDetectionEngine::default();
        let report = engine.analyze_project(&ProjectModel::new()).unwrap();
        assert_eq!(report.summary.total_races, 0);
        assert!(report.races.is_empty());
        assert_eq!(report.lock_coverage.coverage_ratio, 0.0);
        assert!(!report.is_partial());
    }
}
