/// Race analyzer port trait
use crate::errors::Result;
use crate::features::race_detection::domain::RaceReport;
use crate::shared::models::ProjectModel;

/// Port trait for race analyzers
///
/// Allows hosts to swap the heuristic engine for another implementation.
pub trait RaceAnalyzerPort {
    /// Analyze every atom of the project
    fn analyze_project(&self, project: &ProjectModel) -> Result<RaceReport>;
}
