/// Deadlock detection over lock acquisition orders
///
/// ## Algorithm
/// 1. **Lock order extraction**: explicit acquires and monitor entries per atom, in code order
/// 2. **Pairwise check**: two atoms taking the same two locks in opposite order
/// 3. **Cycle search** (opt-in): lock-order graph, Tarjan's SCC, then one
///    elementary cycle of 3+ locks per component
///
/// ## Example
/// ```text
/// transfer():  a.acquire(); b.acquire();
/// refund():    b.acquire(); a.acquire();   -> potential_deadlock {a, b}
/// ```
use super::detectors::{explicit_acquisitions, monitor_acquisitions};
use crate::features::race_detection::domain::{Deadlock, DeadlockKind, LockOrder};
use crate::shared::models::Atom;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Acquisition order of named locks in `atom`; `None` when it takes none
pub fn extract_lock_order(atom: &Atom) -> Option<LockOrder> {
    let mut acquisitions = explicit_acquisitions(&atom.code);
    acquisitions.extend(
        monitor_acquisitions(&atom.code)
            .into_iter()
            .filter(|(_, name)| !name.is_empty()),
    );
    acquisitions.sort();

    let mut locks: Vec<String> = Vec::new();
    for (_, name) in acquisitions {
        if !locks.contains(&name) {
            locks.push(name);
        }
    }

    if locks.is_empty() {
        None
    } else {
        Some(LockOrder {
            atom_id: atom.id.clone(),
            locks,
        })
    }
}

/// Pairwise lock-ordering check
///
/// One finding per lock pair, listing every atom that takes the pair in
/// either conflicting order.
pub fn detect_deadlocks(orders: &[LockOrder]) -> Vec<Deadlock> {
    let mut conflicts: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();

    for (i, first) in orders.iter().enumerate() {
        for second in &orders[i + 1..] {
            if first.atom_id == second.atom_id {
                continue;
            }
            for (pos, a) in first.locks.iter().enumerate() {
                for b in &first.locks[pos + 1..] {
                    let (Some(b_pos), Some(a_pos)) = (second.position(b), second.position(a)) else {
                        continue;
                    };
                    if b_pos < a_pos {
                        let key = if a < b {
                            (a.clone(), b.clone())
                        } else {
                            (b.clone(), a.clone())
                        };
                        let atoms = conflicts.entry(key).or_default();
                        atoms.insert(first.atom_id.clone());
                        atoms.insert(second.atom_id.clone());
                    }
                }
            }
        }
    }

    conflicts
        .into_iter()
        .map(|((a, b), atoms)| {
            let atoms: Vec<String> = atoms.into_iter().collect();
            Deadlock {
                kind: DeadlockKind::PotentialDeadlock,
                description: format!(
                    "Locks '{}' and '{}' are acquired in opposite order by {}",
                    a,
                    b,
                    atoms.join(", ")
                ),
                locks: vec![a, b],
                atoms,
            }
        })
        .collect()
}

/// Upper bound on DFS steps spent looking for a cycle inside one component
const CYCLE_SEARCH_BUDGET: usize = 100_000;

/// Elementary cycle of at least three nodes inside `members`, starting at its
/// smallest lock name
///
/// A strongly connected component can be made of two-lock inversions only
/// (`a <-> b <-> c`), which holds no such cycle.
fn elementary_cycle(graph: &DiGraph<&str, ()>, members: &[NodeIndex]) -> Option<Vec<NodeIndex>> {
    let mut starts = members.to_vec();
    starts.sort_by_key(|idx| graph[*idx]);
    let mut budget = CYCLE_SEARCH_BUDGET;

    for &start in &starts {
        // Only nodes ordered after `start`, so each cycle is found from its smallest lock
        let allowed = |idx: NodeIndex| members.contains(&idx) && graph[idx] > graph[start];
        let successors = |idx: NodeIndex| {
            let mut next: Vec<NodeIndex> = graph.neighbors(idx).collect();
            next.sort_by_key(|n| graph[*n]);
            next.dedup();
            next
        };

        let mut path = vec![start];
        let mut stack = vec![successors(start)];
        while let Some(frontier) = stack.last_mut() {
            if budget == 0 {
                debug!("Cycle search budget exhausted at {}", graph[start]);
                return None;
            }
            budget -= 1;

            let Some(next) = (!frontier.is_empty()).then(|| frontier.remove(0)) else {
                stack.pop();
                path.pop();
                continue;
            };
            if next == start && path.len() >= 3 {
                return Some(path);
            }
            if allowed(next) && !path.contains(&next) {
                path.push(next);
                stack.push(successors(next));
            }
        }
    }
    None
}

/// Cycles of three or more locks in the lock-order graph
///
/// Edge `a -> b` whenever some atom acquires `a` before `b`. Two-lock cycles
/// are left to [`detect_deadlocks`]. A component is reported only when it
/// holds an elementary cycle of three or more locks; the description walks
/// that cycle in acquisition order.
pub fn detect_lock_order_cycles(orders: &[LockOrder]) -> Vec<Deadlock> {
    let mut edges: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
    for order in orders {
        for (pos, a) in order.locks.iter().enumerate() {
            for b in &order.locks[pos + 1..] {
                edges
                    .entry((a.clone(), b.clone()))
                    .or_default()
                    .insert(order.atom_id.clone());
            }
        }
    }

    let lock_names: BTreeSet<&String> = edges.keys().flat_map(|(a, b)| [a, b]).collect();
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let nodes: BTreeMap<&str, NodeIndex> = lock_names
        .into_iter()
        .map(|name| (name.as_str(), graph.add_node(name.as_str())))
        .collect();
    for (a, b) in edges.keys() {
        graph.add_edge(nodes[a.as_str()], nodes[b.as_str()], ());
    }

    let mut cycles: Vec<Deadlock> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() >= 3)
        .filter_map(|scc| {
            let cycle: Vec<&str> = elementary_cycle(&graph, &scc)?
                .into_iter()
                .map(|idx| graph[idx])
                .collect();
            let atoms: BTreeSet<String> = cycle
                .iter()
                .zip(cycle.iter().cycle().skip(1))
                .filter_map(|(a, b)| edges.get(&(a.to_string(), b.to_string())))
                .flat_map(|atoms| atoms.iter().cloned())
                .collect();
            let mut walk: Vec<&str> = cycle.clone();
            walk.push(cycle[0]);
            let mut locks: Vec<String> = cycle.iter().map(|s| s.to_string()).collect();
            locks.sort();
            debug!("Lock-order cycle over {} locks", locks.len());
            Some(Deadlock {
                kind: DeadlockKind::PotentialDeadlockCycle,
                description: format!(
                    "Lock-order cycle {}: establish one global acquisition order",
                    walk.join(" -> ")
                ),
                locks,
                atoms: atoms.into_iter().collect(),
            })
        })
        .collect();

    cycles.sort_by(|a, b| a.locks.cmp(&b.locks));
    cycles
}
