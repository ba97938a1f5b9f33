/// Lazy singleton tracker
///
/// Recognizes the lazy-init shape
///
/// ```text
/// if (!instance) {            // guard
///     instance = create();    // Write (initialization)
/// }
/// return instance;            // Read (cached value)
/// ```
///
/// Guards: `if (!v)`, `if (v == null)`, `if (v === undefined)`,
/// `if (typeof v === 'undefined')` and `v ??= ...`.
use super::{atom_position, AccessTracker};
use crate::features::race_detection::domain::{
    number_accesses, Access, AccessKind, AccessScope, TrackerKind,
};
use crate::shared::code_text::{declares_locally, find_identifier, is_write_at};
use crate::shared::models::Atom;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref GUARD_RES: Vec<Regex> = vec![
        Regex::new(r"if\s*\(\s*!\s*(?P<v>[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\s*\)").unwrap(),
        Regex::new(
            r"if\s*\(\s*(?P<v>[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\s*===?\s*(?:null|undefined)\s*\)"
        )
        .unwrap(),
        Regex::new(
            r#"if\s*\(\s*typeof\s+(?P<v>[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\s*===?\s*['"]undefined['"]\s*\)"#
        )
        .unwrap(),
    ];
    static ref NULLISH_ASSIGN_RE: Regex =
        Regex::new(r"(?P<v>[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\s*\?\?=").unwrap();
}

/// Lazy-init shape found in a piece of code (offsets into that code)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyInitGuard {
    pub variable: String,
    pub guard_offset: usize,
    pub init_offset: usize,
    pub return_offsets: Vec<usize>,
}

/// All complete lazy-init shapes in `code`, in guard order
///
/// A shape needs a guard, an assignment after it, and at least one `return v`.
pub fn lazy_init_guards(code: &str) -> Vec<LazyInitGuard> {
    let mut candidates: Vec<(usize, String, Option<usize>)> = Vec::new();

    for re in GUARD_RES.iter() {
        for caps in re.captures_iter(code) {
            if let (Some(whole), Some(v)) = (caps.get(0), caps.name("v")) {
                candidates.push((whole.start(), v.as_str().to_string(), None));
            }
        }
    }
    for caps in NULLISH_ASSIGN_RE.captures_iter(code) {
        if let Some(v) = caps.name("v") {
            candidates.push((v.start(), v.as_str().to_string(), Some(v.start())));
        }
    }
    candidates.sort();

    let mut guards: Vec<LazyInitGuard> = Vec::new();
    for (guard_offset, variable, nullish_init) in candidates {
        if guards.iter().any(|g| g.variable == variable) {
            continue;
        }
        if !variable.contains('.') && declares_locally(code, &variable) {
            continue;
        }

        let occurrences = find_identifier(code, &variable);
        let init_offset = nullish_init.or_else(|| {
            occurrences
                .iter()
                .copied()
                .find(|&offset| offset > guard_offset && is_write_at(code, offset, variable.len()))
        });
        let Some(init_offset) = init_offset else {
            continue;
        };

        let return_offsets: Vec<usize> = occurrences
            .into_iter()
            .filter(|&offset| is_returned_at(code, offset))
            .collect();
        if return_offsets.is_empty() {
            continue;
        }

        guards.push(LazyInitGuard {
            variable,
            guard_offset,
            init_offset,
            return_offsets,
        });
    }
    guards
}

fn is_returned_at(code: &str, offset: usize) -> bool {
    let before = code[..offset].trim_end();
    before.ends_with("return")
        && before[..before.len() - "return".len()]
            .chars()
            .next_back()
            .map_or(true, |c| !crate::shared::code_text::is_ident_char(c))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingletonTracker;

impl AccessTracker for SingletonTracker {
    fn kind(&self) -> TrackerKind {
        TrackerKind::Singleton
    }

    fn collect(&self, atom: &Atom) -> Vec<Access> {
        let mut accesses = Vec::new();

        for guard in lazy_init_guards(&atom.code) {
            let scope = if guard.variable.starts_with("this.") {
                AccessScope::Instance
            } else {
                AccessScope::Global
            };

            let (line, column) = atom_position(atom, guard.init_offset);
            accesses.push(
                Access::new(&atom.id, &guard.variable, AccessKind::Write, TrackerKind::Singleton)
                    .with_scope(scope)
                    .at(line, column),
            );

            for offset in guard.return_offsets {
                let (line, column) = atom_position(atom, offset);
                accesses.push(
                    Access::new(&atom.id, &guard.variable, AccessKind::Read, TrackerKind::Singleton)
                        .with_scope(scope)
                        .at(line, column),
                );
            }
        }

        number_accesses(&atom.id, TrackerKind::Singleton, &mut accesses);
        accesses
    }
}
