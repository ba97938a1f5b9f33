//! Race detection configuration
//!
//! One struct covers the whole engine. Load it from a preset, override fields
//! with the builder methods, or read it from YAML.

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::validation::Validatable;
use crate::features::race_detection::domain::TrackerKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Score thresholds for severity buckets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 0.8,
            high: 0.6,
            medium: 0.3,
        }
    }
}

/// Frequency factor curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyCurve {
    /// Score for a resource touched at most twice
    pub baseline: f64,
    /// Increment per access beyond two
    pub step: f64,
    /// Ceiling
    pub max: f64,
}

impl Default for FrequencyCurve {
    fn default() -> Self {
        Self {
            baseline: 0.5,
            step: 0.1,
            max: 0.85,
        }
    }
}

/// Race detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Preset this configuration was derived from
    pub preset: Preset,

    /// Trackers run during COLLECT
    pub enabled_trackers: Vec<TrackerKind>,

    pub severity_thresholds: SeverityThresholds,

    pub frequency: FrequencyCurve,

    /// Candidate pairs kept per resource (1..=100000)
    pub max_pairs_per_resource: usize,

    /// Caller hops walked when looking for entry points (1..=64)
    pub max_caller_depth: usize,

    /// Keep Local-scope accesses (namespaced per atom)
    pub include_local_scope: bool,

    /// Search the lock-order graph for N-lock cycles
    pub full_cycle_detection: bool,

    /// Score multiplier for downgraded findings (0.0, 1.0]
    pub downgrade_factor: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

impl RaceConfig {
    /// Complete configuration for a preset
    pub fn from_preset(preset: Preset) -> Self {
        let base = Self {
            preset,
            enabled_trackers: TrackerKind::all().to_vec(),
            severity_thresholds: SeverityThresholds::default(),
            frequency: FrequencyCurve::default(),
            max_pairs_per_resource: 500,
            max_caller_depth: 8,
            include_local_scope: true,
            full_cycle_detection: true,
            downgrade_factor: 0.7,
        };

        match preset {
            Preset::Fast => Self {
                max_pairs_per_resource: 100,
                max_caller_depth: 4,
                include_local_scope: false,
                full_cycle_detection: false,
                ..base
            },
            Preset::Balanced => base,
            Preset::Thorough => Self {
                max_pairs_per_resource: 5000,
                max_caller_depth: 32,
                ..base
            },
        }
    }

    pub fn trackers(mut self, trackers: impl IntoIterator<Item = TrackerKind>) -> Self {
        self.enabled_trackers = trackers.into_iter().collect();
        self
    }

    /// Select trackers by name (`closure`, `singleton`, `external`)
    pub fn tracker_names<'n>(self, names: impl IntoIterator<Item = &'n str>) -> ConfigResult<Self> {
        let valid: Vec<&str> = TrackerKind::all().iter().map(|k| k.as_str()).collect();
        let kinds = names
            .into_iter()
            .map(|name| {
                TrackerKind::all()
                    .iter()
                    .copied()
                    .find(|k| k.as_str() == name.trim())
                    .ok_or_else(|| ConfigError::unknown_tracker(name, &valid))
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(self.trackers(kinds))
    }

    pub fn max_pairs_per_resource(mut self, cap: usize) -> Self {
        self.max_pairs_per_resource = cap;
        self
    }

    pub fn max_caller_depth(mut self, depth: usize) -> Self {
        self.max_caller_depth = depth;
        self
    }

    pub fn include_local_scope(mut self, include: bool) -> Self {
        self.include_local_scope = include;
        self
    }

    pub fn full_cycle_detection(mut self, enabled: bool) -> Self {
        self.full_cycle_detection = enabled;
        self
    }

    pub fn downgrade_factor(mut self, factor: f64) -> Self {
        self.downgrade_factor = factor;
        self
    }

    pub fn is_tracker_enabled(&self, kind: TrackerKind) -> bool {
        self.enabled_trackers.contains(&kind)
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: RaceConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self).map_err(ConfigError::Yaml)
    }
}

impl Validatable for RaceConfig {
    fn validate(&self) -> ConfigResult<()> {
        let t = &self.severity_thresholds;
        for (field, value) in [
            ("severity_thresholds.critical", t.critical),
            ("severity_thresholds.high", t.high),
            ("severity_thresholds.medium", t.medium),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::range_with_hint(
                    field,
                    value,
                    0.0,
                    1.0,
                    "Thresholds are risk scores and must lie in (0, 1]",
                ));
            }
        }
        if !(t.critical > t.high && t.high > t.medium) {
            return Err(ConfigError::Validation(format!(
                "severity thresholds must be strictly descending (critical {} > high {} > medium {})",
                t.critical, t.high, t.medium
            )));
        }

        let f = &self.frequency;
        if !(0.0..=1.0).contains(&f.baseline) || !(0.0..=1.0).contains(&f.max) || f.max < f.baseline {
            return Err(ConfigError::Validation(format!(
                "frequency curve must satisfy 0 <= baseline ({}) <= max ({}) <= 1",
                f.baseline, f.max
            )));
        }
        if !(f.step > 0.0) {
            return Err(ConfigError::Validation(format!(
                "frequency step must be positive, got {}",
                f.step
            )));
        }

        if self.max_pairs_per_resource == 0 || self.max_pairs_per_resource > 100_000 {
            return Err(ConfigError::range_with_hint(
                "max_pairs_per_resource",
                self.max_pairs_per_resource,
                1,
                100_000,
                "Pair formation is quadratic per resource",
            ));
        }

        if self.max_caller_depth == 0 || self.max_caller_depth > 64 {
            return Err(ConfigError::range_with_hint(
                "max_caller_depth",
                self.max_caller_depth,
                1,
                64,
                "Caller walk needs at least one hop",
            ));
        }

        if !(self.downgrade_factor > 0.0 && self.downgrade_factor <= 1.0) {
            return Err(ConfigError::range_with_hint(
                "downgrade_factor",
                self.downgrade_factor,
                0.0,
                1.0,
                "A downgrade must not raise the score or zero it out",
            ));
        }

        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "RaceConfig"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for preset in [Preset::Fast, Preset::Balanced, Preset::Thorough] {
            assert!(RaceConfig::from_preset(preset).validate().is_ok(), "{preset}");
        }
    }

    #[test]
    fn test_fast_preset_skips_cycle_search() {
        let config = RaceConfig::from_preset(Preset::Fast);
        assert!(!config.full_cycle_detection);
        assert!(!config.include_local_scope);
    }

    #[test]
    fn test_thresholds_must_descend() {
        let mut config = RaceConfig::default();
        config.severity_thresholds.high = 0.9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("strictly descending"));
    }

    #[test]
    fn test_zero_caller_depth_rejected() {
        let config = RaceConfig::default().max_caller_depth(0);
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));
    }

    #[test]
    fn test_downgrade_factor_range() {
        assert!(RaceConfig::default().downgrade_factor(0.0).validate().is_err());
        assert!(RaceConfig::default().downgrade_factor(1.0).validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = "max_caller_depth: 3\nenabled_trackers: [closure, external]\n";
        let config = RaceConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_caller_depth, 3);
        assert!(config.is_tracker_enabled(TrackerKind::Closure));
        assert!(!config.is_tracker_enabled(TrackerKind::Singleton));
        assert_eq!(config.severity_thresholds, SeverityThresholds::default());
    }

    #[test]
    fn test_yaml_invalid_value_rejected() {
        let yaml = "downgrade_factor: 1.5\n";
        assert!(RaceConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_tracker_names() {
        let config = RaceConfig::default().tracker_names(["closure", "external"]).unwrap();
        assert_eq!(
            config.enabled_trackers,
            vec![TrackerKind::Closure, TrackerKind::ExternalResource]
        );

        let err = RaceConfig::default().tracker_names(["singelton"]).unwrap_err();
        assert!(err.to_string().contains("Did you mean 'singleton'?"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = RaceConfig::from_preset(Preset::Thorough);
        let yaml = config.to_yaml().unwrap();
        let recovered = RaceConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config, recovered);
    }
}
