/// Human-readable trace and fix suggestion for a finding
use super::patterns::{BuiltinPattern, MatchContext, PatternMatch, PatternRegistry};
use crate::features::race_detection::domain::{
    Access, ConcurrencyVerdict, LockProtection, RacePair,
};

pub fn build_explanation(pair: &RacePair, ctx: &MatchContext<'_>, matched: &PatternMatch) -> String {
    let timing = match ctx.verdict {
        ConcurrencyVerdict::Concurrent => "proven concurrent (fan-out or independent triggers)",
        ConcurrencyVerdict::Unknown if ctx.same_entry_point => {
            "ordering unknown, both reached from the same entry point"
        }
        ConcurrencyVerdict::Unknown => "ordering unknown, assumed concurrent",
        ConcurrencyVerdict::Sequential => "ordered, flagged by a timing-independent pattern",
    };
    let locking = if matched.downgraded {
        "common lock held but never released"
    } else if ctx.has_common_lock {
        "common lock"
    } else {
        match ctx.lock_protection {
            LockProtection::Partial => "partial lock protection",
            _ => "no lock protection",
        }
    };

    format!(
        "Race on '{}' ({}):\n\
         1. {}\n\
         2. {}\n\
         3. Timing: {}\n\
         4. Locking: {}\n\
         -> Pattern {} (also: {})",
        pair.resource_name(),
        pair.race_type.as_str(),
        describe(&pair.first),
        describe(&pair.second),
        timing,
        locking,
        matched.primary,
        secondary(matched),
    )
}

pub fn build_fix_suggestion(
    resource: &str,
    matched: &PatternMatch,
    registry: &PatternRegistry,
) -> String {
    let builtin = registry
        .get(&matched.primary)
        .and_then(|p| p.builtin())
        .or_else(|| BuiltinPattern::from_name(&matched.primary));
    match builtin {
        Some(pattern) => pattern.fix_suggestion(resource),
        None => format!(
            "Review accesses to '{}' flagged by '{}' and serialize them with a shared lock",
            resource, matched.primary
        ),
    }
}

fn describe(access: &Access) -> String {
    format!(
        "{:?} in {} at line {} ({} tracker, {} scope)",
        access.kind,
        access.atom_id,
        access.source_position.line,
        access.tracker,
        access.scope.as_str()
    )
}

fn secondary(matched: &PatternMatch) -> String {
    if matched.all.len() <= 1 {
        "none".to_string()
    } else {
        matched.all[1..].join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::race_detection::domain::{AccessKind, TrackerKind};

    fn sample() -> (RacePair, PatternMatch) {
        let pair = RacePair::new(
            Access::new("inc", "count", AccessKind::Write, TrackerKind::Closure)
                .at(3, 5)
                .with_id("inc#0"),
            Access::new("reset", "count", AccessKind::Write, TrackerKind::Closure)
                .at(9, 1)
                .with_id("reset#0"),
        )
        .unwrap();
        let matched = PatternMatch {
            primary: "counter-increment".to_string(),
            all: vec!["counter-increment".to_string(), "write-write-conflict".to_string()],
            downgraded: false,
        };
        (pair, matched)
    }

    #[test]
    fn test_explanation_lists_both_accesses() {
        let (pair, matched) = sample();
        let ctx = MatchContext::concurrent().with_verdict(ConcurrencyVerdict::Concurrent);
        let text = build_explanation(&pair, &ctx, &matched);
        assert!(text.starts_with("Race on 'count' (WW)"));
        assert!(text.contains("Write in inc at line 3"));
        assert!(text.contains("Write in reset at line 9"));
        assert!(text.contains("proven concurrent"));
        assert!(text.contains("also: write-write-conflict"));
    }

    #[test]
    fn test_fix_suggestion_for_builtin_and_custom() {
        let (_, matched) = sample();
        let registry = PatternRegistry::with_builtins();
        assert!(build_fix_suggestion("count", &matched, &registry).contains("atomic"));

        let custom = PatternMatch {
            primary: "team-rule".to_string(),
            all: vec!["team-rule".to_string()],
            downgraded: false,
        };
        let text = build_fix_suggestion("count", &custom, &registry);
        assert!(text.contains("'team-rule'"));
    }
}
