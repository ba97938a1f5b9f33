//! Timing / concurrency-feasibility analysis
//!
//! Decides whether two accesses can overlap in time. Most racy-looking code is
//! sequential, so the analyzer looks for a proof of ordering:
//!
//! - same atom: no `await` between the two accesses, sync code, or two awaited
//!   statements where the later one consumes a binding of the earlier one
//! - caller/callee: the call is awaited (or synchronous)
//! - siblings: their only common caller awaits both calls one after the other
//!
//! Fan-out combinators (`Promise.all`, `.map(async ...)`) and fire-and-forget
//! calls are positive evidence of concurrency. Anything else is `Unknown`,
//! which still counts as concurrent.

use crate::features::race_detection::domain::{Access, ConcurrencyVerdict};
use crate::features::race_detection::ports::AtomLookup;
use crate::shared::code_text::{
    await_offsets, concurrent_regions, declared_bindings, find_identifier, is_async_code,
    is_ident_char, line_at, line_bounds, line_col_to_offset, matching_paren,
};
use crate::shared::models::Atom;
use std::collections::{BTreeSet, VecDeque};
use std::ops::Range;
use tracing::debug;

pub struct TimingAnalyzer<'a> {
    lookup: &'a dyn AtomLookup,
    max_caller_depth: usize,
}

impl<'a> TimingAnalyzer<'a> {
    pub fn new(lookup: &'a dyn AtomLookup, max_caller_depth: usize) -> Self {
        Self {
            lookup,
            max_caller_depth: max_caller_depth.max(1),
        }
    }

    /// Fail-open: only a proven ordering returns false
    pub fn can_run_concurrently(&self, a: &Access, b: &Access) -> bool {
        self.verdict(a, b).can_run_concurrently()
    }

    pub fn verdict(&self, a: &Access, b: &Access) -> ConcurrencyVerdict {
        let (Some(atom_a), Some(atom_b)) = (
            self.lookup.find_atom_by_id(&a.atom_id),
            self.lookup.find_atom_by_id(&b.atom_id),
        ) else {
            debug!("Timing unknown, atom not found: {} / {}", a.atom_id, b.atom_id);
            return ConcurrencyVerdict::Unknown;
        };

        if atom_a.id == atom_b.id {
            return same_atom_verdict(atom_a, a, b);
        }

        if self.calls(atom_a, atom_b) {
            return call_verdict(atom_a, atom_b);
        }
        if self.calls(atom_b, atom_a) {
            return call_verdict(atom_b, atom_a);
        }

        self.sibling_verdict(atom_a, atom_b)
    }

    fn calls(&self, caller: &Atom, callee: &Atom) -> bool {
        self.lookup
            .get_atom_callers(&callee.id)
            .iter()
            .any(|c| c.id == caller.id)
    }

    fn sibling_verdict(&self, a: &Atom, b: &Atom) -> ConcurrencyVerdict {
        let callers_a = self.lookup.get_atom_callers(&a.id);
        let callers_b = self.lookup.get_atom_callers(&b.id);

        if callers_a.is_empty() || callers_b.is_empty() {
            return ConcurrencyVerdict::Unknown;
        }

        let ids_a: BTreeSet<&str> = callers_a.iter().map(|c| c.id.as_str()).collect();
        let ids_b: BTreeSet<&str> = callers_b.iter().map(|c| c.id.as_str()).collect();
        let common: Vec<&str> = ids_a.intersection(&ids_b).copied().collect();

        let sole_common_caller = common.len() == 1 && ids_a.len() == 1 && ids_b.len() == 1;
        if !sole_common_caller {
            // Independent or multiple call sites: no ordering relationship
            return ConcurrencyVerdict::Concurrent;
        }

        let caller = callers_a[0];
        let sites_a = call_sites(&caller.code, a.call_name());
        let sites_b = call_sites(&caller.code, b.call_name());
        if sites_a.is_empty() || sites_b.is_empty() {
            return ConcurrencyVerdict::Unknown;
        }

        let regions = concurrent_regions(&caller.code);
        let in_region = |site: &usize| regions.iter().any(|r| r.contains(site));
        if sites_a.iter().chain(sites_b.iter()).any(in_region) {
            return ConcurrencyVerdict::Concurrent;
        }

        let caller_is_async = is_async_code(&caller.code);
        let ordered = |sites: &[usize], callee: &Atom| {
            sites
                .iter()
                .all(|&site| !caller_is_async || is_awaited_call(&caller.code, site) || !is_async_code(&callee.code))
        };
        if ordered(sites_a.as_slice(), a) && ordered(sites_b.as_slice(), b) {
            ConcurrencyVerdict::Sequential
        } else {
            ConcurrencyVerdict::Concurrent
        }
    }

    /// Roots reached walking callers up to `max_caller_depth` hops
    ///
    /// An atom without callers is its own entry point. Atoms at the depth limit
    /// count as roots.
    pub fn entry_points(&self, atom_id: &str) -> BTreeSet<String> {
        let mut roots = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([(atom_id.to_string(), 0usize)]);

        while let Some((id, depth)) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let callers = self.lookup.get_atom_callers(&id);
            if callers.is_empty() || depth >= self.max_caller_depth {
                roots.insert(id);
                continue;
            }
            for caller in callers {
                queue.push_back((caller.id.clone(), depth + 1));
            }
        }
        roots
    }

    /// The atom plus every caller within `max_caller_depth` hops
    pub fn ancestors(&self, atom_id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([(atom_id.to_string(), 0usize)]);

        while let Some((id, depth)) = queue.pop_front() {
            if !seen.insert(id.clone()) || depth >= self.max_caller_depth {
                continue;
            }
            for caller in self.lookup.get_atom_callers(&id) {
                queue.push_back((caller.id.clone(), depth + 1));
            }
        }
        seen
    }

    /// Same external trigger (entry point) reaches both atoms
    pub fn same_entry_point(&self, a_atom: &str, b_atom: &str) -> bool {
        a_atom == b_atom
            || !self
                .entry_points(a_atom)
                .is_disjoint(&self.entry_points(b_atom))
    }

    /// One atom is reachable from the other, or they share an ancestor
    pub fn same_business_flow(&self, a_atom: &str, b_atom: &str) -> bool {
        a_atom == b_atom || !self.ancestors(a_atom).is_disjoint(&self.ancestors(b_atom))
    }
}

/// Byte offset of a file-relative access position inside the atom's code
pub fn access_offset(atom: &Atom, access: &Access) -> Option<usize> {
    let line = access.source_position.line.checked_sub(atom.start_line.max(1))?;
    line_col_to_offset(&atom.code, line, access.source_position.column.max(1))
}

fn same_atom_verdict(atom: &Atom, a: &Access, b: &Access) -> ConcurrencyVerdict {
    let (Some(oa), Some(ob)) = (access_offset(atom, a), access_offset(atom, b)) else {
        debug!("Timing unknown, position outside atom {}", atom.id);
        return ConcurrencyVerdict::Unknown;
    };
    let (first, second) = if oa <= ob { (oa, ob) } else { (ob, oa) };
    let code = &atom.code;

    let regions = concurrent_regions(code);
    if regions
        .iter()
        .any(|r| r.contains(&first) && r.contains(&second))
    {
        return ConcurrencyVerdict::Concurrent;
    }

    if !is_async_code(code) {
        return ConcurrencyVerdict::Sequential;
    }

    if awaited_with_dependency(code, first, second) {
        return ConcurrencyVerdict::Sequential;
    }

    let (first_line_start, _) = line_bounds(code, first);
    let (_, second_line_end) = line_bounds(code, second);
    let window: Range<usize> = first_line_start.max(first)..second_line_end;
    let awaits_between = await_offsets(code).into_iter().any(|w| window.contains(&w));

    if awaits_between {
        // Another invocation can run between the two accesses
        ConcurrencyVerdict::Concurrent
    } else {
        ConcurrencyVerdict::Sequential
    }
}

/// Both lines await and the later one uses a binding declared by the earlier one
fn awaited_with_dependency(code: &str, first: usize, second: usize) -> bool {
    let (first_start, _) = line_bounds(code, first);
    let (second_start, _) = line_bounds(code, second);
    if first_start == second_start {
        return false;
    }
    let first_line = line_at(code, first);
    let second_line = line_at(code, second);
    if find_identifier(first_line, "await").is_empty() || find_identifier(second_line, "await").is_empty() {
        return false;
    }
    declared_bindings(first_line)
        .iter()
        .any(|binding| !find_identifier(second_line, binding).is_empty())
}

fn call_verdict(caller: &Atom, callee: &Atom) -> ConcurrencyVerdict {
    let sites = call_sites(&caller.code, callee.call_name());
    if sites.is_empty() {
        return ConcurrencyVerdict::Unknown;
    }

    let regions = concurrent_regions(&caller.code);
    if sites.iter().any(|site| regions.iter().any(|r| r.contains(site))) {
        return ConcurrencyVerdict::Concurrent;
    }

    let callee_is_async = is_async_code(&callee.code);
    let fire_and_forget = sites
        .iter()
        .any(|&site| callee_is_async && !is_awaited_call(&caller.code, site));
    if fire_and_forget {
        ConcurrencyVerdict::Concurrent
    } else {
        ConcurrencyVerdict::Sequential
    }
}

/// Offsets of `name(` calls, including method calls (`this.name(`)
///
/// Definitions are skipped: `function name(`, and `name(...) {` method heads.
pub fn call_sites(code: &str, name: &str) -> Vec<usize> {
    if name.is_empty() {
        return Vec::new();
    }
    code.match_indices(name)
        .map(|(start, _)| start)
        .filter(|&start| {
            let before_ok = code[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !is_ident_char(c));
            let rest = &code[start + name.len()..];
            let after_ok = rest.chars().next().map_or(false, |c| !is_ident_char(c))
                && rest.trim_start().starts_with('(');
            if !(before_ok && after_ok) {
                return false;
            }
            let is_declaration = code[..start].trim_end().ends_with("function");
            let open = start + name.len() + (rest.len() - rest.trim_start().len());
            let is_method_head = matching_paren(code, open)
                .map_or(false, |close| code[close + 1..].trim_start().starts_with('{'));
            !is_declaration && !is_method_head
        })
        .collect()
}

/// Call at `site` is awaited or returned (`await this.save(x)`, `return save(x)`)
pub fn is_awaited_call(code: &str, site: usize) -> bool {
    let before = code[..site].trim_end_matches(|c: char| is_ident_char(c) || c == '.');
    let before = before.trim_end();
    ["await", "return"].iter().any(|kw| {
        before.ends_with(kw)
            && before[..before.len() - kw.len()]
                .chars()
                .next_back()
                .map_or(true, |c| !is_ident_char(c))
    })
}
