//! Configuration system
//!
//! ```rust,ignore
//! use codegraph_race::config::{Preset, RaceConfig};
//!
//! // Preset
//! let config = RaceConfig::from_preset(Preset::Fast);
//!
//! // Preset with overrides
//! let config = RaceConfig::from_preset(Preset::Balanced).max_caller_depth(4);
//!
//! // YAML (partial files fall back to balanced defaults)
//! let config = RaceConfig::from_yaml_file("race.yaml")?;
//! ```

pub mod error;
pub mod preset;
pub mod race_config;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use preset::Preset;
pub use race_config::{FrequencyCurve, RaceConfig, SeverityThresholds};
pub use validation::{Validatable, ValidatableCollection};
