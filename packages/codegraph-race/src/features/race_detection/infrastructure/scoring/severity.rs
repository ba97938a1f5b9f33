/// Score to severity bucket
use crate::config::SeverityThresholds;
use crate::features::race_detection::domain::Severity;

/// Bucket with the default thresholds (0.8 / 0.6 / 0.3)
pub fn calculate_score_severity(score: f64) -> Severity {
    severity_with_thresholds(score, &SeverityThresholds::default())
}

/// `critical >= t.critical`, `high >= t.high`, `medium >= t.medium`, else low.
/// NaN is low.
pub fn severity_with_thresholds(score: f64, thresholds: &SeverityThresholds) -> Severity {
    if score >= thresholds.critical {
        Severity::Critical
    } else if score >= thresholds.high {
        Severity::High
    } else if score >= thresholds.medium {
        Severity::Medium
    } else {
        Severity::Low
    }
}
