/*
 * Codegraph Race - Race Condition Detection Engine
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Input models (Atom, ProjectModel) and code-text helpers
 * - features/    : race_detection (domain → infrastructure → application, ports)
 * - config/      : Presets, YAML loading, validation
 *
 * Pure analysis library: single-threaded, deterministic, no I/O besides
 * optional config loading.
 */

#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::unnecessary_map_or)] // map_or style for compatibility

pub mod config;
pub mod errors;
pub mod features;
pub mod shared;

pub use config::{Preset, RaceConfig};
pub use errors::{RaceError, Result};
pub use features::race_detection::{
    AtomLookup, PatternRegistry, Race, RaceAnalyzerPort, RaceDetectionEngine, RaceReport,
    Severity, Summary,
};
pub use shared::models::{Atom, ClosureVariable, ProjectModel};
