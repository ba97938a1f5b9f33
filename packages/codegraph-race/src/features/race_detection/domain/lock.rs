/// Lock, lock-order and deadlock models
use serde::{Deserialize, Serialize};
use std::fmt;

/// Synchronization construct family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LockKind {
    /// lock/unlock, acquire/release, mutex helpers
    Explicit,
    /// `synchronized`-style block wrapping
    Monitor,
    /// Compare-and-set / atomic increment primitives
    Atomic,
    /// begin/commit/rollback framing
    Transaction,
}

impl LockKind {
    pub fn all() -> &'static [LockKind] {
        &[
            LockKind::Explicit,
            LockKind::Monitor,
            LockKind::Atomic,
            LockKind::Transaction,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::Explicit => "explicit",
            LockKind::Monitor => "monitor",
            LockKind::Atomic => "atomic",
            LockKind::Transaction => "transaction",
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock scope
///
/// Global/Instance/Local come from the scope classifier; atomics always have
/// Operation scope, transactions always Transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockScope {
    Global,
    Instance,
    Local,
    Operation,
    Transaction,
}

impl LockScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockScope::Global => "global",
            LockScope::Instance => "instance",
            LockScope::Local => "local",
            LockScope::Operation => "operation",
            LockScope::Transaction => "transaction",
        }
    }
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a detector is looking: which atom, which resource, which byte
///
/// With an `offset`, a lock is only reported when its guarded region
/// contains that byte of the atom body. Without one, any region counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessContext<'a> {
    pub atom_id: &'a str,
    pub resource_name: &'a str,
    pub offset: Option<usize>,
}

impl<'a> AccessContext<'a> {
    pub fn new(atom_id: &'a str, resource_name: &'a str) -> Self {
        Self {
            atom_id,
            resource_name,
            offset: None,
        }
    }

    /// Pin the context to one byte offset in the atom body
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether a guarded byte range covers this context
    pub fn within(&self, region: std::ops::Range<usize>) -> bool {
        self.offset.map_or(true, |offset| region.contains(&offset))
    }
}

/// Recognized synchronization construct guarding `target` inside one atom
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    #[serde(rename = "type")]
    pub kind: LockKind,
    pub target: String,
    pub scope: LockScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_name: Option<String>,
    pub has_release: bool,
    pub atom_id: String,
}

impl Lock {
    pub fn new(
        kind: LockKind,
        target: impl Into<String>,
        scope: LockScope,
        atom_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            scope,
            lock_name: None,
            has_release: false,
            atom_id: atom_id.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.lock_name = Some(name.into());
        self
    }

    pub fn released(mut self, has_release: bool) -> Self {
        self.has_release = has_release;
        self
    }

    /// Identity used to decide whether two accesses share a lock
    ///
    /// Named explicit/monitor locks compare by name. Atomics, transactions and
    /// unnamed locks compare by kind.
    pub fn key(&self) -> &str {
        match (self.kind, self.lock_name.as_deref()) {
            (LockKind::Explicit | LockKind::Monitor, Some(name)) => name,
            _ => self.kind.as_str(),
        }
    }
}

/// Lock acquisition order observed in one atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockOrder {
    pub atom_id: String,
    pub locks: Vec<String>,
}

impl LockOrder {
    pub fn new<I, S>(atom_id: impl Into<String>, locks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            atom_id: atom_id.into(),
            locks: locks.into_iter().map(Into::into).collect(),
        }
    }

    /// Position of the first acquisition of `lock`
    pub fn position(&self, lock: &str) -> Option<usize> {
        self.locks.iter().position(|l| l == lock)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlockKind {
    /// Two atoms take the same two locks in opposite order
    PotentialDeadlock,
    /// Cycle of three or more locks in the lock-order graph
    PotentialDeadlockCycle,
}

impl DeadlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlockKind::PotentialDeadlock => "potential_deadlock",
            DeadlockKind::PotentialDeadlockCycle => "potential_deadlock_cycle",
        }
    }
}

/// Deadlock finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deadlock {
    pub kind: DeadlockKind,
    /// Locks on the cycle (sorted)
    pub locks: Vec<String>,
    /// Atoms contributing an edge of the cycle (sorted)
    pub atoms: Vec<String>,
    pub description: String,
}

/// Coverage of accesses by recognized locks
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockCoverage {
    pub total: usize,
    pub protected: usize,
    pub unprotected: usize,
    /// protected / total; 0.0 when there are no accesses
    pub coverage_ratio: f64,
}

impl LockCoverage {
    pub fn from_counts(total: usize, protected: usize) -> Self {
        let protected = protected.min(total);
        let coverage_ratio = if total == 0 {
            0.0
        } else {
            protected as f64 / total as f64
        };
        Self {
            total,
            protected,
            unprotected: total - protected,
            coverage_ratio,
        }
    }
}

/// Lock protection of a pair of accesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockProtection {
    /// Neither access is under a lock
    Unprotected,
    /// Only one access is locked, or they use different locks
    Partial,
    /// Both accesses share a lock
    Full,
}
