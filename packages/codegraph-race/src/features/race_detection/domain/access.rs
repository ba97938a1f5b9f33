/// Access model: one read or write touch of a shared resource
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracker that produced an access
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrackerKind {
    #[serde(rename = "closure")]
    Closure,
    #[serde(rename = "singleton")]
    Singleton,
    #[serde(rename = "external")]
    ExternalResource,
}

impl TrackerKind {
    /// All trackers, in collection order
    pub fn all() -> &'static [TrackerKind] {
        &[
            TrackerKind::Closure,
            TrackerKind::Singleton,
            TrackerKind::ExternalResource,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerKind::Closure => "closure",
            TrackerKind::Singleton => "singleton",
            TrackerKind::ExternalResource => "external",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    pub fn is_write(&self) -> bool {
        matches!(self, AccessKind::Write)
    }
}

/// Visibility of the touched resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
    /// Module-level variable or external resource
    Global,
    /// Receiver-qualified state (`this.x`)
    Instance,
    /// Declared inside the atom
    Local,
}

impl AccessScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessScope::Global => "global",
            AccessScope::Instance => "instance",
            AccessScope::Local => "local",
        }
    }
}

/// File-relative position (1-based line and column)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Conflict category of a pair of accesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RaceType {
    #[serde(rename = "RW")]
    ReadWrite,
    #[serde(rename = "WW")]
    WriteWrite,
}

impl RaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceType::ReadWrite => "RW",
            RaceType::WriteWrite => "WW",
        }
    }
}

/// Access record
///
/// Immutable once COLLECT has produced it. `id` is `{atom_id}#{tracker}:{n}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    pub id: String,
    pub atom_id: String,
    pub resource_name: String,
    pub kind: AccessKind,
    pub scope: AccessScope,
    pub source_position: SourcePosition,
    pub tracker: TrackerKind,
}

impl Access {
    pub fn new(
        atom_id: impl Into<String>,
        resource_name: impl Into<String>,
        kind: AccessKind,
        tracker: TrackerKind,
    ) -> Self {
        Self {
            id: String::new(),
            atom_id: atom_id.into(),
            resource_name: resource_name.into(),
            kind,
            scope: AccessScope::Global,
            source_position: SourcePosition::default(),
            tracker,
        }
    }

    pub fn with_scope(mut self, scope: AccessScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.source_position = SourcePosition::new(line, column);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_write(&self) -> bool {
        self.kind.is_write()
    }

    /// Conflict category with `other`, if the two conflict
    ///
    /// Conflicting means same resource and at least one write.
    pub fn conflict_with(&self, other: &Access) -> Option<RaceType> {
        if self.resource_name != other.resource_name {
            return None;
        }
        match (self.is_write(), other.is_write()) {
            (true, true) => Some(RaceType::WriteWrite),
            (true, false) | (false, true) => Some(RaceType::ReadWrite),
            (false, false) => None,
        }
    }

    /// Total order used for pairing and output
    pub fn sort_key(&self) -> (&str, SourcePosition, &str) {
        (&self.atom_id, self.source_position, &self.id)
    }
}

/// Assign `{atom_id}#{tracker}:{n}` ids in position order
pub fn number_accesses(atom_id: &str, tracker: TrackerKind, accesses: &mut [Access]) {
    accesses.sort_by(|a, b| {
        (a.source_position, &a.resource_name, a.kind).cmp(&(
            b.source_position,
            &b.resource_name,
            b.kind,
        ))
    });
    for (n, access) in accesses.iter_mut().enumerate() {
        access.id = format!("{}#{}:{}", atom_id, tracker.as_str(), n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(resource: &str, kind: AccessKind) -> Access {
        Access::new("app::a", resource, kind, TrackerKind::Closure)
    }

    #[test]
    fn test_conflict_categories() {
        let read = access("count", AccessKind::Read);
        let write = access("count", AccessKind::Write);
        assert_eq!(read.conflict_with(&write), Some(RaceType::ReadWrite));
        assert_eq!(write.conflict_with(&read), Some(RaceType::ReadWrite));
        assert_eq!(write.conflict_with(&write), Some(RaceType::WriteWrite));
        assert_eq!(read.conflict_with(&read), None);
    }

    #[test]
    fn test_different_resources_never_conflict() {
        let a = access("count", AccessKind::Write);
        let b = access("total", AccessKind::Write);
        assert_eq!(a.conflict_with(&b), None);
    }

    #[test]
    fn test_number_accesses_orders_by_position() {
        let mut accesses = vec![
            access("count", AccessKind::Write).at(5, 3),
            access("count", AccessKind::Read).at(2, 1),
        ];
        number_accesses("app::a", TrackerKind::Closure, &mut accesses);
        assert_eq!(accesses[0].id, "app::a#closure:0");
        assert_eq!(accesses[0].source_position.line, 2);
        assert_eq!(accesses[1].id, "app::a#closure:1");
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(access("count", AccessKind::Write).at(1, 2)).unwrap();
        assert_eq!(json["resourceName"], "count");
        assert_eq!(json["kind"], "Write");
        assert_eq!(json["scope"], "global");
        assert_eq!(json["sourcePosition"]["line"], 1);
        assert_eq!(json["tracker"], "closure");
    }
}
