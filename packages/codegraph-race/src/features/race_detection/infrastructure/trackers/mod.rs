//! Access trackers
//!
//! Each tracker turns one atom into zero or more [`Access`] records. Trackers
//! never fail: anything they cannot classify confidently is omitted.
//!
//! ```text
//! Tracker
//! ├── Closure           captured variables (markers or code scan)
//! ├── Singleton         lazy init guard + cached return
//! └── ExternalResource  database / queue / filesystem / cache calls
//! ```

pub mod closure_tracker;
pub mod external_resource_tracker;
pub mod singleton_tracker;

pub use closure_tracker::ClosureTracker;
pub use external_resource_tracker::{ExternalResourceTracker, ResourceCategory};
pub use singleton_tracker::{lazy_init_guards, LazyInitGuard, SingletonTracker};

use crate::features::race_detection::domain::{Access, TrackerKind};
use crate::shared::models::Atom;

/// Common tracker contract
pub trait AccessTracker {
    fn kind(&self) -> TrackerKind;

    /// Accesses found in `atom`, numbered `{atom_id}#{tracker}:{n}`
    fn collect(&self, atom: &Atom) -> Vec<Access>;
}

/// Closed set of trackers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracker {
    Closure(ClosureTracker),
    Singleton(SingletonTracker),
    ExternalResource(ExternalResourceTracker),
}

impl Tracker {
    pub fn from_kind(kind: TrackerKind) -> Self {
        match kind {
            TrackerKind::Closure => Tracker::Closure(ClosureTracker),
            TrackerKind::Singleton => Tracker::Singleton(SingletonTracker),
            TrackerKind::ExternalResource => Tracker::ExternalResource(ExternalResourceTracker),
        }
    }

    /// Trackers for the given kinds, deduplicated, in [`TrackerKind::all`] order
    pub fn for_kinds(kinds: &[TrackerKind]) -> Vec<Tracker> {
        TrackerKind::all()
            .iter()
            .filter(|kind| kinds.contains(kind))
            .map(|kind| Tracker::from_kind(*kind))
            .collect()
    }
}

impl AccessTracker for Tracker {
    fn kind(&self) -> TrackerKind {
        match self {
            Tracker::Closure(t) => t.kind(),
            Tracker::Singleton(t) => t.kind(),
            Tracker::ExternalResource(t) => t.kind(),
        }
    }

    fn collect(&self, atom: &Atom) -> Vec<Access> {
        match self {
            Tracker::Closure(t) => t.collect(atom),
            Tracker::Singleton(t) => t.collect(atom),
            Tracker::ExternalResource(t) => t.collect(atom),
        }
    }
}

/// File-relative (line, column) of a byte offset into `atom.code`
///
/// Lines past `u32::MAX` saturate.
pub(crate) fn atom_position(atom: &Atom, offset: usize) -> (u32, u32) {
    let (line_index, column) = crate::shared::code_text::offset_to_line_col(&atom.code, offset);
    (atom.start_line.max(1).saturating_add(line_index), column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_kinds_dedups_and_orders() {
        let trackers = Tracker::for_kinds(&[
            TrackerKind::ExternalResource,
            TrackerKind::Closure,
            TrackerKind::Closure,
        ]);
        let kinds: Vec<_> = trackers.iter().map(|t| t.kind()).collect();
        assert_eq!(kinds, vec![TrackerKind::Closure, TrackerKind::ExternalResource]);
    }

    #[test]
    fn test_atom_position_is_file_relative() {
        let atom = Atom::new("a", "function f() {\n  count++;\n}").with_start_line(10);
        let offset = atom.code.find("count").unwrap();
        assert_eq!(atom_position(&atom, offset), (11, 3));
    }

    #[test]
    fn test_atom_position_saturates_at_last_line() {
        let atom = Atom::new("a", "x = 1;\ncount++;").with_start_line(u32::MAX);
        let offset = atom.code.find("count").unwrap();
        assert_eq!(atom_position(&atom, offset), (u32::MAX, 1));
        for kind in TrackerKind::all() {
            let _ = Tracker::from_kind(*kind).collect(&atom);
        }
    }

    #[test]
    fn test_empty_atom_yields_nothing() {
        let atom = Atom::new("a", "");
        for kind in TrackerKind::all() {
            assert!(Tracker::from_kind(*kind).collect(&atom).is_empty());
        }
    }
}
