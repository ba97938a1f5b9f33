/// Lock index, coverage and pair mitigation
use super::detectors::detect_all;
use crate::features::race_detection::domain::{
    Access, AccessContext, Lock, LockCoverage, LockProtection, RacePair, SourcePosition,
};
use crate::features::race_detection::infrastructure::timing::access_offset;
use crate::shared::models::Atom;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

type GuardKey = (String, String, SourcePosition);

fn guard_key(access: &Access) -> GuardKey {
    (
        access.atom_id.clone(),
        access.resource_name.clone(),
        access.source_position,
    )
}

/// Recognized locks keyed by target resource, and the locks guarding each access
///
/// Equal locks are recorded once per target. Several distinct locks may
/// guard one resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockIndex {
    by_target: BTreeMap<String, Vec<Lock>>,
    by_access: BTreeMap<GuardKey, Vec<Lock>>,
}

impl LockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, lock: Lock) {
        let locks = self.by_target.entry(lock.target.clone()).or_default();
        if !locks.contains(&lock) {
            locks.push(lock);
        }
    }

    /// Record `lock` as held at `access`
    pub fn guard(&mut self, access: &Access, lock: Lock) {
        let held = self.by_access.entry(guard_key(access)).or_default();
        if !held.contains(&lock) {
            held.push(lock.clone());
        }
        self.insert(lock);
    }

    /// Fold another index into this one
    pub fn merge(&mut self, other: LockIndex) {
        for (key, locks) in other.by_access {
            let held = self.by_access.entry(key).or_default();
            for lock in locks {
                if !held.contains(&lock) {
                    held.push(lock);
                }
            }
        }
        for lock in other.by_target.into_values().flatten() {
            self.insert(lock);
        }
    }

    pub fn locks_for(&self, target: &str) -> &[Lock] {
        self.by_target
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Locks whose guarded region contains `access`
    pub fn locks_guarding(&self, access: &Access) -> &[Lock] {
        self.by_access
            .get(&guard_key(access))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lock> {
        self.by_target.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}

/// Run every detector at the position of each access
///
/// Missing atoms and positions outside the atom body are skipped, so those
/// accesses count as unguarded.
pub fn collect_locks<'a, L>(accesses: &[Access], atom_lookup_fn: L) -> LockIndex
where
    L: Fn(&str) -> Option<&'a Atom>,
{
    let mut index = LockIndex::new();
    for access in accesses {
        let Some(atom) = atom_lookup_fn(&access.atom_id) else {
            debug!("Lock scan skipped, atom not found: {}", access.atom_id);
            continue;
        };
        let Some(offset) = access_offset(atom, access) else {
            debug!(
                "Lock scan skipped, {} at {} lies outside atom {}",
                access.resource_name, access.source_position, atom.id
            );
            continue;
        };
        let ctx = AccessContext::new(&access.atom_id, &access.resource_name).at(offset);
        for lock in detect_all(&atom.code, &ctx) {
            index.guard(access, lock);
        }
    }
    index
}

/// Coverage of `accesses` by `locks`
///
/// An access is protected when some lock targets its resource and `detect_fn`
/// fires at the access's own position in its atom. Empty input gives ratio 0.0.
pub fn analyze_lock_coverage<'a, D, L>(
    accesses: &[Access],
    locks: &[Lock],
    detect_fn: D,
    atom_lookup_fn: L,
) -> LockCoverage
where
    D: Fn(&str, &AccessContext<'_>) -> Option<Lock>,
    L: Fn(&str) -> Option<&'a Atom>,
{
    let targets: BTreeSet<&str> = locks.iter().map(|l| l.target.as_str()).collect();

    let protected = accesses
        .iter()
        .filter(|access| targets.contains(access.resource_name.as_str()))
        .filter(|access| {
            let Some(atom) = atom_lookup_fn(&access.atom_id) else {
                return false;
            };
            access_offset(atom, access).map_or(false, |offset| {
                let ctx = AccessContext::new(&access.atom_id, &access.resource_name).at(offset);
                detect_fn(&atom.code, &ctx).is_some()
            })
        })
        .count();

    LockCoverage::from_counts(accesses.len(), protected)
}

/// Lock relationship between the two accesses of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairLocking {
    pub protection: LockProtection,
    /// Both accesses are under a lock with the same key
    pub has_common_lock: bool,
    /// Some shared lock is released everywhere it is taken
    pub released: bool,
}

impl PairLocking {
    pub fn unprotected() -> Self {
        Self {
            protection: LockProtection::Unprotected,
            has_common_lock: false,
            released: false,
        }
    }
}

pub fn pair_protection(pair: &RacePair, locks: &LockIndex) -> PairLocking {
    let first = locks.locks_guarding(&pair.first);
    let second = locks.locks_guarding(&pair.second);

    if first.is_empty() && second.is_empty() {
        return PairLocking::unprotected();
    }

    let first_keys: BTreeSet<&str> = first.iter().map(|l| l.key()).collect();
    let second_keys: BTreeSet<&str> = second.iter().map(|l| l.key()).collect();
    let common: Vec<&str> = first_keys.intersection(&second_keys).copied().collect();

    if common.is_empty() {
        return PairLocking {
            protection: LockProtection::Partial,
            has_common_lock: false,
            released: false,
        };
    }

    let released = common.iter().any(|key| {
        first
            .iter()
            .chain(second.iter())
            .filter(|lock| lock.key() == *key)
            .all(|lock| lock.has_release)
    });

    PairLocking {
        protection: LockProtection::Full,
        has_common_lock: true,
        released,
    }
}

/// True when one released lock covers both accesses of the pair
pub fn check_mitigation(pair: &RacePair, locks: &LockIndex) -> bool {
    let locking = pair_protection(pair, locks);
    locking.protection == LockProtection::Full && locking.released
}
