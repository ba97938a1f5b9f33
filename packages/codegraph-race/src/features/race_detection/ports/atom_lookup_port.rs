/// Lookup capabilities consumed from the surrounding project model
use crate::shared::models::Atom;

/// Port trait for atom lookup
///
/// `ProjectModel::index()` ships the in-memory implementation. Hosts with their
/// own graph store implement this directly.
pub trait AtomLookup {
    /// `None` is a MissingAtom: callers skip, never fail
    fn find_atom_by_id(&self, id: &str) -> Option<&Atom>;

    /// Direct callers, sorted by id
    fn get_atom_callers(&self, id: &str) -> Vec<&Atom>;
}
