//! Phase pipeline
//!
//! Linear state machine `COLLECT -> ENRICH -> SUMMARY`. Extra phases are
//! inserted by name anywhere before SUMMARY. Every phase runs even when an
//! earlier one failed (partial results still get summarized); a phase that
//! returns an error or panics is recorded as failed.

use super::phases::{CollectPhase, EnrichPhase};
use crate::config::RaceConfig;
use crate::errors::{RaceError, Result};
use crate::features::race_detection::domain::{
    Access, ConcurrencyVerdict, Deadlock, LockCoverage, LockOrder, PhaseRecord, Race, RacePair,
    Summary, TrackerKind,
};
use crate::features::race_detection::infrastructure::lock_analysis::{LockIndex, PairLocking};
use crate::features::race_detection::infrastructure::patterns::PatternRegistry;
use crate::features::race_detection::ports::AtomLookup;
use crate::shared::models::Atom;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

pub const COLLECT: &str = "COLLECT";
pub const ENRICH: &str = "ENRICH";
pub const SUMMARY: &str = "SUMMARY";

/// Read-only inputs shared by all phases
pub struct PhaseContext<'a> {
    pub lookup: &'a dyn AtomLookup,
    /// Atoms to analyze, in project order
    pub atoms: &'a [&'a Atom],
    pub config: &'a RaceConfig,
    pub registry: &'a PatternRegistry,
}

/// Pair that survived lock and timing filtering
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub pair: RacePair,
    pub verdict: ConcurrencyVerdict,
    pub locking: PairLocking,
}

/// State threaded through the phases
#[derive(Debug, Clone, Default)]
pub struct AnalysisState {
    pub accesses: Vec<Access>,
    /// Accesses per resource, after filtering
    pub access_counts: BTreeMap<String, usize>,
    pub locks: LockIndex,
    pub lock_orders: Vec<LockOrder>,
    pub lock_coverage: LockCoverage,
    pub deadlocks: Vec<Deadlock>,
    pub candidates: Vec<Candidate>,
    pub races: Vec<Race>,
    pub trackers_used: BTreeSet<TrackerKind>,
    pub strategies_used: BTreeSet<String>,
}

impl AnalysisState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_strategy(&mut self, strategy: &str) {
        self.strategies_used.insert(strategy.to_string());
    }
}

/// One step of the pipeline
pub trait PipelinePhase {
    fn name(&self) -> &str;

    /// Reason to skip this phase given the current state
    fn skip_reason(&self, _state: &AnalysisState) -> Option<String> {
        None
    }

    /// Run the phase; returns the number of items it produced
    fn run(&self, ctx: &PhaseContext<'_>, state: &mut AnalysisState) -> Result<usize>;
}

/// Pipeline result before it is wrapped into a report
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub state: AnalysisState,
    pub summary: Summary,
    pub phases: Vec<PhaseRecord>,
}

pub struct PhasePipeline {
    phases: Vec<Box<dyn PipelinePhase>>,
}

impl PhasePipeline {
    /// Pipeline without phases; SUMMARY still runs
    pub fn empty() -> Self {
        Self { phases: Vec::new() }
    }

    pub fn with_default_phases() -> Self {
        Self {
            phases: vec![Box::new(CollectPhase), Box::new(EnrichPhase)],
        }
    }

    /// Declared order, SUMMARY last
    pub fn phase_names(&self) -> Vec<&str> {
        self.phases
            .iter()
            .map(|p| p.name())
            .chain(std::iter::once(SUMMARY))
            .collect()
    }

    pub fn insert_phase_before(
        &mut self,
        anchor: &str,
        phase: Box<dyn PipelinePhase>,
    ) -> Result<()> {
        self.ensure_new(phase.name())?;
        let index = if anchor == SUMMARY {
            self.phases.len()
        } else {
            self.position(anchor)?
        };
        self.phases.insert(index, phase);
        Ok(())
    }

    /// SUMMARY is terminal, nothing goes after it
    pub fn insert_phase_after(
        &mut self,
        anchor: &str,
        phase: Box<dyn PipelinePhase>,
    ) -> Result<()> {
        self.ensure_new(phase.name())?;
        let index = self.position(anchor)? + 1;
        self.phases.insert(index, phase);
        Ok(())
    }

    pub fn run(&self, ctx: &PhaseContext<'_>, analyzed_at: DateTime<Utc>) -> PipelineOutput {
        let mut state = AnalysisState::new();
        let mut records = Vec::with_capacity(self.phases.len() + 1);

        for phase in &self.phases {
            let name = phase.name().to_string();
            if let Some(reason) = phase.skip_reason(&state) {
                debug!("Phase {} skipped: {}", name, reason);
                records.push(PhaseRecord::skipped(name, reason));
                continue;
            }

            debug!("Phase {} started", name);
            let outcome = catch_unwind(AssertUnwindSafe(|| phase.run(ctx, &mut state)));
            let record = match outcome {
                Ok(Ok(items)) => {
                    debug!("Phase {} completed: {} items", name, items);
                    PhaseRecord::completed(name, items)
                }
                Ok(Err(err)) => {
                    let err = RaceError::PhaseFailed {
                        phase: name.clone(),
                        reason: err.to_string(),
                    };
                    warn!("{}", err);
                    PhaseRecord::failed(name, err.to_string())
                }
                Err(payload) => {
                    let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                    warn!("Phase {} {}", name, reason);
                    PhaseRecord::failed(name, reason)
                }
            };
            records.push(record);
        }

        let summary = Summary::from_races(
            &state.races,
            state.trackers_used.iter().map(|t| t.as_str().to_string()).collect(),
            state.strategies_used.iter().cloned().collect(),
            analyzed_at,
        );
        records.push(PhaseRecord::completed(SUMMARY, summary.total_races));
        info!(
            "Race analysis finished: {} races, {} deadlocks",
            summary.total_races,
            state.deadlocks.len()
        );

        PipelineOutput {
            state,
            summary,
            phases: records,
        }
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.phases
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| RaceError::UnknownPhase(name.to_string()))
    }

    fn ensure_new(&self, name: &str) -> Result<()> {
        if name == SUMMARY || self.phases.iter().any(|p| p.name() == name) {
            return Err(RaceError::DuplicatePhase(name.to_string()));
        }
        Ok(())
    }
}

impl Default for PhasePipeline {
    fn default() -> Self {
        Self::with_default_phases()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
