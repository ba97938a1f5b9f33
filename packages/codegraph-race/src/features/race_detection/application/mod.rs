pub mod analyze_races;
pub mod phases;
pub mod pipeline;

pub use analyze_races::RaceDetectionEngine;
pub use phases::{CollectPhase, EnrichPhase};
pub use pipeline::{
    AnalysisState, Candidate, PhaseContext, PhasePipeline, PipelineOutput, PipelinePhase, COLLECT,
    ENRICH, SUMMARY,
};
