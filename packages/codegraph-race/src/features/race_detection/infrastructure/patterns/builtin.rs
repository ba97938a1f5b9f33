/// Built-in race signatures
///
/// Ordered by specificity: bug shapes first, plain RW/WW classification last.
///
/// | Pattern                        | Specificity | Shape                                   |
/// |--------------------------------|-------------|-----------------------------------------|
/// | `lazy-singleton-init`          | 90          | `if (!x) x = create(); return x`        |
/// | `counter-increment`            | 85          | `n++`, `n += 1`, `n = n + 1`            |
/// | `check-then-act`               | 80          | read in a condition, write after it     |
/// | `unreleased-lock`              | 70          | common lock, no recorded release        |
/// | `external-resource-contention` | 60          | both sides hit a database/queue/fs/cache|
/// | `shared-entry-point`           | 50          | both atoms reached from one entry point |
/// | `write-write-conflict`         | 20          | any WW pair                             |
/// | `read-write-conflict`          | 10          | any RW pair                             |
use super::matcher::MatchContext;
use crate::features::race_detection::domain::{AccessKind, RacePair, RaceType, TrackerKind};
use crate::features::race_detection::infrastructure::trackers::lazy_init_guards;
use crate::shared::code_text::{declared_bindings, find_identifier, increments};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CONDITION_RE: Regex =
        Regex::new(r"\b(?:if|while)\s*\(|\?[^?:.]+:|&&|\|\|").unwrap();
    static ref IF_CONDITION_RE: Regex = Regex::new(r"\b(?:if|while)\s*\((?P<cond>[^)]*)\)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinPattern {
    LazySingletonInit,
    CounterIncrement,
    CheckThenAct,
    UnreleasedLock,
    ExternalResourceContention,
    SharedEntryPoint,
    WriteWriteConflict,
    ReadWriteConflict,
}

impl BuiltinPattern {
    pub fn all() -> &'static [BuiltinPattern] {
        &[
            BuiltinPattern::LazySingletonInit,
            BuiltinPattern::CounterIncrement,
            BuiltinPattern::CheckThenAct,
            BuiltinPattern::UnreleasedLock,
            BuiltinPattern::ExternalResourceContention,
            BuiltinPattern::SharedEntryPoint,
            BuiltinPattern::WriteWriteConflict,
            BuiltinPattern::ReadWriteConflict,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinPattern::LazySingletonInit => "lazy-singleton-init",
            BuiltinPattern::CounterIncrement => "counter-increment",
            BuiltinPattern::CheckThenAct => "check-then-act",
            BuiltinPattern::UnreleasedLock => "unreleased-lock",
            BuiltinPattern::ExternalResourceContention => "external-resource-contention",
            BuiltinPattern::SharedEntryPoint => "shared-entry-point",
            BuiltinPattern::WriteWriteConflict => "write-write-conflict",
            BuiltinPattern::ReadWriteConflict => "read-write-conflict",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BuiltinPattern::LazySingletonInit => {
                "Lazy initialization guard can be passed by two callers before either assigns"
            }
            BuiltinPattern::CounterIncrement => {
                "Read-modify-write of a counter interleaves and loses updates"
            }
            BuiltinPattern::CheckThenAct => {
                "Condition is checked, then acted on after the state may have changed"
            }
            BuiltinPattern::UnreleasedLock => "Both accesses share a lock that is never released",
            BuiltinPattern::ExternalResourceContention => {
                "Concurrent operations on the same external resource"
            }
            BuiltinPattern::SharedEntryPoint => {
                "Both accesses are reached from one entry point that may run repeatedly"
            }
            BuiltinPattern::WriteWriteConflict => "Two writes to the same resource may interleave",
            BuiltinPattern::ReadWriteConflict => "A read may observe a concurrent write",
        }
    }

    pub fn specificity(&self) -> u8 {
        match self {
            BuiltinPattern::LazySingletonInit => 90,
            BuiltinPattern::CounterIncrement => 85,
            BuiltinPattern::CheckThenAct => 80,
            BuiltinPattern::UnreleasedLock => 70,
            BuiltinPattern::ExternalResourceContention => 60,
            BuiltinPattern::SharedEntryPoint => 50,
            BuiltinPattern::WriteWriteConflict => 20,
            BuiltinPattern::ReadWriteConflict => 10,
        }
    }

    pub fn from_name(name: &str) -> Option<BuiltinPattern> {
        Self::all().iter().copied().find(|p| p.name() == name)
    }

    pub fn fix_suggestion(&self, resource: &str) -> String {
        match self {
            BuiltinPattern::LazySingletonInit => format!(
                "Cache the initialization promise for '{resource}' instead of the resolved value, \
                 so concurrent callers await the same initialization"
            ),
            BuiltinPattern::CounterIncrement => format!(
                "Make the update of '{resource}' atomic (Atomics.add, INCR, $inc) or serialize it with a mutex"
            ),
            BuiltinPattern::CheckThenAct => format!(
                "Perform the check and the update of '{resource}' as one atomic operation \
                 (conditional write, upsert, or a critical section)"
            ),
            BuiltinPattern::UnreleasedLock => format!(
                "Release the lock guarding '{resource}' in a finally block or use a scoped helper like runExclusive"
            ),
            BuiltinPattern::ExternalResourceContention => format!(
                "Wrap the operations on '{resource}' in a transaction or use optimistic concurrency (version checks)"
            ),
            BuiltinPattern::SharedEntryPoint => format!(
                "Serialize requests that touch '{resource}' (per-key queue or idempotency key)"
            ),
            BuiltinPattern::WriteWriteConflict => format!(
                "Protect every write to '{resource}' with the same lock"
            ),
            BuiltinPattern::ReadWriteConflict => format!(
                "Read '{resource}' under the lock used by its writers, or take a snapshot before awaiting"
            ),
        }
    }

    pub fn matches(&self, pair: &RacePair, ctx: &MatchContext<'_>) -> bool {
        let resource = pair.resource_name();
        match self {
            BuiltinPattern::UnreleasedLock => ctx.has_common_lock && !ctx.lock_released,
            _ if !ctx.can_run_concurrently => false,
            BuiltinPattern::LazySingletonInit => [ctx.first_code, ctx.second_code]
                .iter()
                .any(|code| lazy_init_guards(code).iter().any(|g| g.variable == resource)),
            BuiltinPattern::CounterIncrement => {
                let name = resource.rsplit("::").next().unwrap_or(resource);
                [ctx.first_code, ctx.second_code]
                    .iter()
                    .any(|code| increments(code, name))
            }
            BuiltinPattern::CheckThenAct => {
                if pair.race_type != RaceType::ReadWrite {
                    return false;
                }
                let (read_line, read_code) = if pair.first.kind == AccessKind::Read {
                    (ctx.first_line, ctx.first_code)
                } else {
                    (ctx.second_line, ctx.second_code)
                };
                is_check(read_line, read_code)
            }
            BuiltinPattern::ExternalResourceContention => {
                pair.first.tracker == TrackerKind::ExternalResource
                    && pair.second.tracker == TrackerKind::ExternalResource
            }
            BuiltinPattern::SharedEntryPoint => ctx.same_entry_point && !pair.is_same_atom(),
            BuiltinPattern::WriteWriteConflict => pair.race_type == RaceType::WriteWrite,
            BuiltinPattern::ReadWriteConflict => pair.race_type == RaceType::ReadWrite,
        }
    }
}

/// The read feeds a decision: it sits in a condition, or it binds a value
/// that a later `if`/`while` tests.
fn is_check(read_line: &str, code: &str) -> bool {
    if CONDITION_RE.is_match(read_line) {
        return true;
    }
    let bindings = declared_bindings(read_line);
    if bindings.is_empty() {
        return false;
    }
    IF_CONDITION_RE.captures_iter(code).any(|caps| {
        caps.name("cond").map_or(false, |cond| {
            bindings
                .iter()
                .any(|b| !find_identifier(cond.as_str(), b).is_empty())
        })
    })
}
