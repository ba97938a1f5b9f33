/// Summary and report models handed to downstream reporting
use super::access::RaceType;
use super::lock::{Deadlock, LockCoverage};
use super::race::{Race, RaceRecord, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceTypeCounts {
    #[serde(rename = "RW")]
    pub read_write: usize,
    #[serde(rename = "WW")]
    pub write_write: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

/// Aggregate over the final race list
///
/// Field names are a stable contract for downstream storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_races: usize,
    pub by_type: RaceTypeCounts,
    pub by_severity: SeverityCounts,
    /// Trackers that produced at least one access
    pub trackers_used: Vec<String>,
    /// Analysis strategies that were exercised
    pub strategies_used: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl Summary {
    pub fn from_races(
        races: &[Race],
        trackers_used: Vec<String>,
        strategies_used: Vec<String>,
        analyzed_at: DateTime<Utc>,
    ) -> Self {
        let mut by_type = RaceTypeCounts::default();
        let mut by_severity = SeverityCounts::default();

        for race in races {
            match race.race_type {
                RaceType::ReadWrite => by_type.read_write += 1,
                RaceType::WriteWrite => by_type.write_write += 1,
            }
            match race.severity {
                Severity::Low => by_severity.low += 1,
                Severity::Medium => by_severity.medium += 1,
                Severity::High => by_severity.high += 1,
                Severity::Critical => by_severity.critical += 1,
            }
        }

        Self {
            total_races: races.len(),
            by_type,
            by_severity,
            trackers_used,
            strategies_used,
            analyzed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Completed,
    Failed,
    Skipped,
}

/// Execution record of one pipeline phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    pub name: String,
    pub status: PhaseStatus,
    /// Items the phase produced (accesses, races, ...)
    pub items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseRecord {
    pub fn completed(name: impl Into<String>, items: usize) -> Self {
        Self {
            name: name.into(),
            status: PhaseStatus::Completed,
            items,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: PhaseStatus::Failed,
            items: 0,
            error: Some(error.into()),
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: PhaseStatus::Skipped,
            items: 0,
            error: Some(reason.into()),
        }
    }
}

/// Full analysis output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceReport {
    pub summary: Summary,
    /// Ordered by risk score (descending), then resource and access ids
    pub races: Vec<Race>,
    pub deadlocks: Vec<Deadlock>,
    pub lock_coverage: LockCoverage,
    pub phases: Vec<PhaseRecord>,
}

impl RaceReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn records(&self) -> Vec<RaceRecord> {
        self.races.iter().map(Race::to_record).collect()
    }

    pub fn races_for(&self, resource_name: &str) -> impl Iterator<Item = &Race> {
        let resource_name = resource_name.to_string();
        self.races
            .iter()
            .filter(move |race| race.resource_name == resource_name)
    }

    /// Whether any phase failed
    pub fn is_partial(&self) -> bool {
        self.phases
            .iter()
            .any(|phase| phase.status == PhaseStatus::Failed)
    }
}
