/// Closure variable tracker
///
/// Uses the extractor's per-occurrence markers when present. Without markers the
/// atom code is scanned for whole-word occurrences: assignments, update and
/// compound operators, and mutating method calls count as writes.
use super::{atom_position, AccessTracker};
use crate::features::race_detection::domain::{
    number_accesses, Access, AccessKind, AccessScope, TrackerKind,
};
use crate::shared::code_text::{declares_locally, find_identifier, is_identifier, is_write_at};
use crate::shared::models::{Atom, ClosureVariable, OccurrenceKind, VariableOrigin};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosureTracker;

impl ClosureTracker {
    /// Global unless the variable is known (or declared) to live inside the atom
    pub fn classify_scope(var: &ClosureVariable, code: &str) -> AccessScope {
        if var.name.starts_with("this.") {
            return AccessScope::Instance;
        }
        match var.origin {
            Some(VariableOrigin::Module) | Some(VariableOrigin::Enclosing) => AccessScope::Global,
            Some(VariableOrigin::Local) => AccessScope::Local,
            None if declares_locally(code, &var.name) => AccessScope::Local,
            None => AccessScope::Global,
        }
    }

    /// Local variables only pair within their own atom
    pub fn resource_name(atom: &Atom, var: &ClosureVariable, scope: AccessScope) -> String {
        match scope {
            AccessScope::Local => format!("{}::{}", atom.id, var.name),
            _ => var.name.clone(),
        }
    }

    fn from_markers(atom: &Atom, var: &ClosureVariable, resource: &str, scope: AccessScope) -> Vec<Access> {
        var.occurrences
            .iter()
            .filter(|occ| occ.line >= 1 && occ.column >= 1)
            .map(|occ| {
                let kind = match occ.kind {
                    OccurrenceKind::Read => AccessKind::Read,
                    OccurrenceKind::Write => AccessKind::Write,
                };
                Access::new(&atom.id, resource, kind, TrackerKind::Closure)
                    .with_scope(scope)
                    .at(occ.line, occ.column)
            })
            .collect()
    }

    fn from_code(atom: &Atom, var: &ClosureVariable, resource: &str, scope: AccessScope) -> Vec<Access> {
        find_identifier(&atom.code, &var.name)
            .into_iter()
            .map(|offset| {
                let kind = if is_write_at(&atom.code, offset, var.name.len()) {
                    AccessKind::Write
                } else {
                    AccessKind::Read
                };
                let (line, column) = atom_position(atom, offset);
                Access::new(&atom.id, resource, kind, TrackerKind::Closure)
                    .with_scope(scope)
                    .at(line, column)
            })
            .collect()
    }
}

impl AccessTracker for ClosureTracker {
    fn kind(&self) -> TrackerKind {
        TrackerKind::Closure
    }

    fn collect(&self, atom: &Atom) -> Vec<Access> {
        let mut accesses = Vec::new();

        for var in &atom.closure_variables {
            if !is_identifier(&var.name) {
                debug!("Skipping closure variable '{}' in {}: not an identifier", var.name, atom.id);
                continue;
            }

            let scope = Self::classify_scope(var, &atom.code);
            let resource = Self::resource_name(atom, var, scope);

            if var.occurrences.is_empty() {
                accesses.extend(Self::from_code(atom, var, &resource, scope));
            } else {
                accesses.extend(Self::from_markers(atom, var, &resource, scope));
            }
        }

        number_accesses(&atom.id, TrackerKind::Closure, &mut accesses);
        accesses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_atom() -> Atom {
        Atom::new(
            "src/counter.ts::increment",
            "async function increment() {\n  const next = count + 1;\n  await save(next);\n  count = next;\n}",
        )
        .with_start_line(3)
        .with_closure_variable(ClosureVariable::new("count").with_origin(VariableOrigin::Module))
    }

    #[test]
    fn test_scan_reads_and_writes() {
        let accesses = ClosureTracker.collect(&counter_atom());
        assert_eq!(accesses.len(), 2);

        assert_eq!(accesses[0].kind, AccessKind::Read);
        assert_eq!(accesses[0].source_position.line, 4);
        assert_eq!(accesses[1].kind, AccessKind::Write);
        assert_eq!(accesses[1].source_position.line, 6);
        assert!(accesses.iter().all(|a| a.scope == AccessScope::Global));
        assert!(accesses.iter().all(|a| a.resource_name == "count"));
        assert_eq!(accesses[1].id, "src/counter.ts::increment#closure:1");
    }

    #[test]
    fn test_markers_take_precedence() {
        let atom = Atom::new("a", "whatever").with_closure_variable(
            ClosureVariable::new("state")
                .with_origin(VariableOrigin::Enclosing)
                .with_occurrence(OccurrenceKind::Write, 12, 5)
                .with_occurrence(OccurrenceKind::Read, 0, 1),
        );
        let accesses = ClosureTracker.collect(&atom);
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].kind, AccessKind::Write);
        assert_eq!(accesses[0].source_position.line, 12);
    }

    #[test]
    fn test_local_variables_are_namespaced() {
        let atom = Atom::new("a::f", "let total = 0;\ntotal += 1;")
            .with_closure_variable(ClosureVariable::new("total"));
        let accesses = ClosureTracker.collect(&atom);
        assert_eq!(accesses.len(), 2);
        assert!(accesses.iter().all(|a| a.scope == AccessScope::Local));
        assert!(accesses.iter().all(|a| a.resource_name == "a::f::total"));
    }

    #[test]
    fn test_instance_scope() {
        let atom = Atom::new("a", "this.items.push(item);")
            .with_closure_variable(ClosureVariable::new("this.items"));
        let accesses = ClosureTracker.collect(&atom);
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].scope, AccessScope::Instance);
        assert_eq!(accesses[0].kind, AccessKind::Write);
    }

    #[test]
    fn test_invalid_names_are_skipped() {
        let atom = Atom::new("a", "x = 1").with_closure_variable(ClosureVariable::new("x y"));
        assert!(ClosureTracker.collect(&atom).is_empty());
    }
}
