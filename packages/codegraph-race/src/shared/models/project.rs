//! Project model (`modules[].files[].atoms[]`) and the in-memory lookup index

use super::atom::Atom;
use crate::features::race_detection::ports::AtomLookup;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    #[serde(default)]
    pub atoms: Vec<Atom>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectModel {
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl ProjectModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-module, single-file project (handy for tests and small inputs)
    pub fn from_atoms(path: impl Into<String>, atoms: Vec<Atom>) -> Self {
        let path = path.into();
        Self {
            modules: vec![Module {
                name: path.clone(),
                files: vec![SourceFile { path, atoms }],
            }],
        }
    }

    /// All atoms in declaration order
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.modules
            .iter()
            .flat_map(|m| m.files.iter())
            .flat_map(|f| f.atoms.iter())
    }

    pub fn atom_count(&self) -> usize {
        self.atoms().count()
    }

    pub fn index(&self) -> AtomIndex<'_> {
        AtomIndex::build(self.atoms())
    }
}

/// Id and caller lookup over borrowed atoms
///
/// Caller edges are the union of `called_by` and every other atom's `calls`
/// entries that name this atom by id or by name.
pub struct AtomIndex<'a> {
    by_id: FxHashMap<&'a str, &'a Atom>,
    callers: FxHashMap<&'a str, Vec<&'a Atom>>,
}

impl<'a> AtomIndex<'a> {
    pub fn build(atoms: impl IntoIterator<Item = &'a Atom>) -> Self {
        let atoms: Vec<&'a Atom> = atoms.into_iter().collect();

        let mut by_id: FxHashMap<&'a str, &'a Atom> = FxHashMap::default();
        let mut by_name: FxHashMap<&'a str, Vec<&'a Atom>> = FxHashMap::default();
        for &atom in &atoms {
            by_id.entry(atom.id.as_str()).or_insert(atom);
            by_name.entry(atom.call_name()).or_default().push(atom);
        }

        let mut callers: FxHashMap<&'a str, Vec<&'a Atom>> = FxHashMap::default();
        for &atom in &atoms {
            for caller_id in &atom.called_by {
                if let Some(&caller) = by_id.get(caller_id.as_str()) {
                    callers.entry(atom.id.as_str()).or_default().push(caller);
                }
            }
            for callee in &atom.calls {
                if let Some(&target) = by_id.get(callee.as_str()) {
                    callers.entry(target.id.as_str()).or_default().push(atom);
                } else if let Some(targets) = by_name.get(callee.as_str()) {
                    for &target in targets {
                        callers.entry(target.id.as_str()).or_default().push(atom);
                    }
                }
            }
        }

        for list in callers.values_mut() {
            list.sort_by(|a, b| a.id.cmp(&b.id));
            list.dedup_by(|a, b| a.id == b.id);
        }

        Self { by_id, callers }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl AtomLookup for AtomIndex<'_> {
    fn find_atom_by_id(&self, id: &str) -> Option<&Atom> {
        self.by_id.get(id).copied()
    }

    fn get_atom_callers(&self, id: &str) -> Vec<&Atom> {
        self.callers
            .get(id)
            .map(|list| list.to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectModel {
        ProjectModel::from_atoms(
            "src/app.ts",
            vec![
                Atom::new("app::route", "await handle()").with_calls(["handle"]),
                Atom::new("app::handle", "counter++"),
                Atom::new("app::cron", "").with_calls(["app::handle"]),
                Atom::new("app::worker", "").with_called_by(["app::cron", "app::ghost"]),
            ],
        )
    }

    #[test]
    fn test_atoms_in_order() {
        let project = project();
        let ids: Vec<_> = project.atoms().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["app::route", "app::handle", "app::cron", "app::worker"]);
    }

    #[test]
    fn test_find_by_id() {
        let project = project();
        let index = project.index();
        assert!(index.find_atom_by_id("app::handle").is_some());
        assert!(index.find_atom_by_id("app::missing").is_none());
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_callers_from_calls_by_name_and_id() {
        let project = project();
        let index = project.index();
        let callers: Vec<_> = index
            .get_atom_callers("app::handle")
            .into_iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(callers, vec!["app::cron", "app::route"]);
    }

    #[test]
    fn test_callers_from_called_by_skips_unknown() {
        let project = project();
        let index = project.index();
        let callers = index.get_atom_callers("app::worker");
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].id, "app::cron");
        assert!(index.get_atom_callers("app::route").is_empty());
    }
}
