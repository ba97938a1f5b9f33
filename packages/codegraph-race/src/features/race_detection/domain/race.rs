/// Race pair and finding models
use super::access::{Access, AccessKind, RaceType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Parse a severity label; unknown labels map to `Low`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly the concurrency evidence supports the finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Outcome of the timing analysis for a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyVerdict {
    /// Positive evidence of overlap (fan-out, fire-and-forget, independent triggers)
    Concurrent,
    /// Proven ordering (same await chain, sync code)
    Sequential,
    /// Not enough context to decide
    Unknown,
}

impl ConcurrencyVerdict {
    /// Fail-open: only a proven ordering rules concurrency out
    pub fn can_run_concurrently(&self) -> bool {
        !matches!(self, ConcurrencyVerdict::Sequential)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyVerdict::Concurrent => "concurrent",
            ConcurrencyVerdict::Sequential => "sequential",
            ConcurrencyVerdict::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestingRequirement {
    Mandatory,
    Recommended,
    Optional,
    Documentation,
}

impl TestingRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestingRequirement::Mandatory => "mandatory",
            TestingRequirement::Recommended => "recommended",
            TestingRequirement::Optional => "optional",
            TestingRequirement::Documentation => "documentation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TestPriority {
    P0,
    P1,
    P2,
    P3,
}

impl TestPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestPriority::P0 => "P0",
            TestPriority::P1 => "P1",
            TestPriority::P2 => "P2",
            TestPriority::P3 => "P3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestingAdvice {
    pub requirement: TestingRequirement,
    pub priority: TestPriority,
}

/// Two conflicting accesses to the same resource
///
/// Unordered as a concept; stored with `first` <= `second` by
/// [`Access::sort_key`] so equal inputs give equal pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RacePair {
    pub first: Access,
    pub second: Access,
    pub race_type: RaceType,
}

impl RacePair {
    /// `None` unless the accesses conflict (same resource, at least one write)
    pub fn new(a: Access, b: Access) -> Option<Self> {
        let race_type = a.conflict_with(&b)?;
        let (first, second) = if a.sort_key() <= b.sort_key() {
            (a, b)
        } else {
            (b, a)
        };
        Some(Self {
            first,
            second,
            race_type,
        })
    }

    pub fn resource_name(&self) -> &str {
        &self.first.resource_name
    }

    pub fn is_same_atom(&self) -> bool {
        self.first.atom_id == self.second.atom_id
    }

    /// Stable identity of the pair
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.resource_name(), self.first.id, self.second.id)
    }
}

/// Race finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    pub id: String,
    pub resource_name: String,
    pub race_type: RaceType,
    pub first: Access,
    pub second: Access,
    pub primary_pattern: String,
    /// Primary first, then secondary matches in evaluation order
    pub matched_patterns: Vec<String>,
    pub severity: Severity,
    pub risk_score: f64,
    pub confidence: Confidence,
    pub testing_advice: TestingAdvice,
    pub explanation: String,
    pub fix_suggestion: String,
}

impl Race {
    pub fn is_write_write(&self) -> bool {
        self.race_type == RaceType::WriteWrite
    }

    /// One-line description
    pub fn description(&self) -> String {
        format!(
            "{} {} race on '{}' ({}) between {} and {}",
            self.severity,
            self.race_type.as_str(),
            self.resource_name,
            self.primary_pattern,
            self.first.atom_id,
            self.second.atom_id
        )
    }

    /// Flat record for persistence
    pub fn to_record(&self) -> RaceRecord {
        RaceRecord {
            id: self.id.clone(),
            resource_name: self.resource_name.clone(),
            race_type: self.race_type,
            first_access_id: self.first.id.clone(),
            first_atom_id: self.first.atom_id.clone(),
            first_kind: self.first.kind,
            first_line: self.first.source_position.line,
            first_column: self.first.source_position.column,
            second_access_id: self.second.id.clone(),
            second_atom_id: self.second.atom_id.clone(),
            second_kind: self.second.kind,
            second_line: self.second.source_position.line,
            second_column: self.second.source_position.column,
            primary_pattern: self.primary_pattern.clone(),
            matched_patterns: self.matched_patterns.join(","),
            severity: self.severity,
            risk_score: self.risk_score,
            confidence: self.confidence,
            testing_requirement: self.testing_advice.requirement,
            testing_priority: self.testing_advice.priority,
        }
    }
}

/// Flat, column-friendly view of a [`Race`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceRecord {
    pub id: String,
    pub resource_name: String,
    pub race_type: RaceType,
    pub first_access_id: String,
    pub first_atom_id: String,
    pub first_kind: AccessKind,
    pub first_line: u32,
    pub first_column: u32,
    pub second_access_id: String,
    pub second_atom_id: String,
    pub second_kind: AccessKind,
    pub second_line: u32,
    pub second_column: u32,
    pub primary_pattern: String,
    /// Comma-separated pattern names
    pub matched_patterns: String,
    pub severity: Severity,
    pub risk_score: f64,
    pub confidence: Confidence,
    pub testing_requirement: TestingRequirement,
    pub testing_priority: TestPriority,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::race_detection::domain::TrackerKind;

    fn access(atom: &str, kind: AccessKind, line: u32) -> Access {
        Access::new(atom, "count", kind, TrackerKind::Closure)
            .at(line, 1)
            .with_id(format!("{atom}#closure:{line}"))
    }

    #[test]
    fn test_pair_requires_conflict() {
        let r1 = access("a", AccessKind::Read, 1);
        let r2 = access("b", AccessKind::Read, 2);
        assert!(RacePair::new(r1, r2).is_none());
    }

    #[test]
    fn test_pair_is_order_independent() {
        let w = access("b", AccessKind::Write, 4);
        let r = access("a", AccessKind::Read, 9);
        let p1 = RacePair::new(w.clone(), r.clone()).unwrap();
        let p2 = RacePair::new(r, w).unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1.first.atom_id, "a");
        assert_eq!(p1.race_type, RaceType::ReadWrite);
        assert!(!p1.is_same_atom());
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::from_label("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from_label("medium"), Severity::Medium);
        assert_eq!(Severity::from_label("catastrophic"), Severity::Low);
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn test_verdict_fails_open() {
        assert!(ConcurrencyVerdict::Concurrent.can_run_concurrently());
        assert!(ConcurrencyVerdict::Unknown.can_run_concurrently());
        assert!(!ConcurrencyVerdict::Sequential.can_run_concurrently());
    }
}
