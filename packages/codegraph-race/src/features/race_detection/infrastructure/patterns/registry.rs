//! Pattern Registry
//!
//! Explicit registry value built once per run. Built-ins are registered by
//! [`PatternRegistry::with_builtins`]; custom patterns are boxed predicates.
//! Patterns are kept sorted by specificity (stable, so ties keep
//! registration order).

use super::builtin::BuiltinPattern;
use super::matcher::MatchContext;
use crate::errors::{RaceError, Result};
use crate::features::race_detection::domain::RacePair;
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Specificity given to custom patterns registered without one
pub const CUSTOM_SPECIFICITY: u8 = 40;

pub type PatternPredicate = Box<dyn Fn(&RacePair, &MatchContext<'_>) -> bool + Send + Sync>;

pub enum PatternKind {
    Builtin(BuiltinPattern),
    Custom(PatternPredicate),
}

impl fmt::Debug for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::Builtin(p) => f.debug_tuple("Builtin").field(p).finish(),
            PatternKind::Custom(_) => f.write_str("Custom(<predicate>)"),
        }
    }
}

#[derive(Debug)]
pub struct Pattern {
    name: String,
    description: String,
    specificity: u8,
    kind: PatternKind,
}

impl Pattern {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specificity(&self) -> u8 {
        self.specificity
    }

    pub fn builtin(&self) -> Option<BuiltinPattern> {
        match self.kind {
            PatternKind::Builtin(p) => Some(p),
            PatternKind::Custom(_) => None,
        }
    }

    /// Evaluate the predicate; a panicking custom predicate is "no match"
    pub fn evaluate(&self, pair: &RacePair, ctx: &MatchContext<'_>) -> bool {
        match &self.kind {
            PatternKind::Builtin(p) => p.matches(pair, ctx),
            PatternKind::Custom(predicate) => {
                match catch_unwind(AssertUnwindSafe(|| predicate(pair, ctx))) {
                    Ok(matched) => matched,
                    Err(_) => {
                        warn!(
                            "Pattern '{}' panicked on pair {}, treated as no match",
                            self.name,
                            pair.key()
                        );
                        false
                    }
                }
            }
        }
    }
}

/// Introspection record returned by [`PatternRegistry::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternInfo {
    pub name: String,
    pub description: String,
    pub specificity: u8,
    pub builtin: bool,
}

#[derive(Debug, Default)]
pub struct PatternRegistry {
    patterns: Vec<Pattern>,
}

impl PatternRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for p in BuiltinPattern::all() {
            registry.patterns.push(Pattern {
                name: p.name().to_string(),
                description: p.description().to_string(),
                specificity: p.specificity(),
                kind: PatternKind::Builtin(*p),
            });
        }
        registry.optimize();
        registry
    }

    /// Register a custom pattern at [`CUSTOM_SPECIFICITY`]
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        predicate: F,
    ) -> Result<()>
    where
        F: Fn(&RacePair, &MatchContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.register_with_specificity(name, description, CUSTOM_SPECIFICITY, predicate)
    }

    pub fn register_with_specificity<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        specificity: u8,
        predicate: F,
    ) -> Result<()>
    where
        F: Fn(&RacePair, &MatchContext<'_>) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(RaceError::DuplicatePattern(name));
        }
        self.patterns.push(Pattern {
            name,
            description: description.into(),
            specificity,
            kind: PatternKind::Custom(Box::new(predicate)),
        });
        self.optimize();
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    /// Registered patterns in evaluation order
    pub fn list(&self) -> Vec<PatternInfo> {
        self.patterns
            .iter()
            .map(|p| PatternInfo {
                name: p.name.clone(),
                description: p.description.clone(),
                specificity: p.specificity,
                builtin: p.builtin().is_some(),
            })
            .collect()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn optimize(&mut self) {
        self.patterns.sort_by_key(|p| std::cmp::Reverse(p.specificity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::race_detection::domain::{Access, AccessKind, TrackerKind};

    fn pair() -> RacePair {
        RacePair::new(
            Access::new("a", "x", AccessKind::Write, TrackerKind::Closure).at(1, 1).with_id("a#0"),
            Access::new("b", "x", AccessKind::Read, TrackerKind::Closure).at(2, 1).with_id("b#0"),
        )
        .unwrap()
    }

    #[test]
    fn test_builtins_listed_by_specificity() {
        let registry = PatternRegistry::with_builtins();
        let list = registry.list();
        assert_eq!(list.len(), BuiltinPattern::all().len());
        assert_eq!(list[0].name, "lazy-singleton-init");
        assert_eq!(list.last().unwrap().name, "read-write-conflict");
        assert!(list.iter().all(|info| info.builtin));
    }

    #[test]
    fn test_custom_pattern_slots_in_by_specificity() {
        let mut registry = PatternRegistry::with_builtins();
        registry
            .register("always", "matches everything", |_, _| true)
            .unwrap();
        registry
            .register_with_specificity("urgent", "first", 100, |_, _| true)
            .unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|i| i.name).collect();
        assert_eq!(names[0], "urgent");
        let always = names.iter().position(|n| n == "always").unwrap();
        let shared = names.iter().position(|n| n == "shared-entry-point").unwrap();
        let ww = names.iter().position(|n| n == "write-write-conflict").unwrap();
        assert!(shared < always && always < ww);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = PatternRegistry::with_builtins();
        let err = registry
            .register("counter-increment", "dup", |_, _| true)
            .unwrap_err();
        assert!(matches!(err, RaceError::DuplicatePattern(name) if name == "counter-increment"));
    }

    #[test]
    fn test_panicking_predicate_is_no_match() {
        let mut registry = PatternRegistry::new();
        registry
            .register("boom", "panics", |_, _| panic!("predicate failure"))
            .unwrap();
        let ctx = MatchContext::concurrent();
        assert!(!registry.get("boom").unwrap().evaluate(&pair(), &ctx));
    }
}
