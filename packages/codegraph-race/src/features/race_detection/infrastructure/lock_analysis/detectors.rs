//! Lock detectors, one per [`LockKind`]
//!
//! Each detector answers "does this snippet guard the resource in this
//! context?" with a [`Lock`] or `None`. Every acquisition has a guarded byte
//! region: the callback argument list, the `synchronized` block, or the span
//! from acquire to release. A context pinned to an offset only sees locks
//! whose region contains it.

use super::scope::determine_scope;
use crate::features::race_detection::domain::{AccessContext, Lock, LockKind, LockScope};
use crate::shared::code_text::{find_identifier, line_at, line_bounds, matching_brace, matching_paren};
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

lazy_static! {
    static ref EXPLICIT_ACQUIRE_RE: Regex = Regex::new(
        r"(?P<recv>[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\s*\.\s*(?P<op>lock|acquire|acquireLock|tryLock|tryAcquire|runExclusive|acquireRead|acquireWrite)\s*\("
    )
    .unwrap();
    static ref BARE_RELEASE_RE: Regex = Regex::new(r"\b(?:release|unlock)\s*\(\s*\)").unwrap();
    static ref SYNCHRONIZED_RE: Regex =
        Regex::new(r"\bsynchronized\s*\(\s*(?P<name>[^)]*?)\s*\)").unwrap();
    static ref LOCKS_REQUEST_RE: Regex =
        Regex::new(r#"locks\s*\.\s*request\s*\(\s*['"`](?P<name>[^'"`]+)['"`]"#).unwrap();
    static ref WITH_LOCK_RE: Regex =
        Regex::new(r#"\bwithLock\s*\(\s*['"`]?(?P<name>[A-Za-z_$][\w$.:-]*)"#).unwrap();
    static ref ATOMIC_PRIMITIVE_RE: Regex = Regex::new(
        r"(?P<name>Atomics\s*\.\s*(?:add|sub|and|or|xor|exchange|compareExchange|store|load)|\b(?:compareAndSet|compareAndSwap|getAndIncrement|incrementAndGet|getAndAdd|addAndGet|atomicIncrement))\s*\("
    )
    .unwrap();
    static ref CACHE_ATOMIC_RE: Regex =
        Regex::new(r"\.\s*(?P<name>incr|incrby|decr|decrby|hincrby|setnx|getset)\s*\(").unwrap();
    static ref DATABASE_ATOMIC_RE: Regex =
        Regex::new(r"(?P<name>\$inc\b|\.\s*increment\s*\(|\.\s*decrement\s*\()").unwrap();
    static ref DATABASE_BEGIN_RE: Regex = Regex::new(
        r"(?P<name>\.\s*(?:transaction|\$transaction|beginTransaction|startTransaction|withTransaction)\s*\(|\bBEGIN(?:\s+TRANSACTION)?\b)"
    )
    .unwrap();
    static ref CACHE_BEGIN_RE: Regex = Regex::new(r"(?P<name>\.\s*multi\s*\()").unwrap();
    static ref TRANSACTION_END_RE: Regex = Regex::new(
        r"\.\s*(?:commit|rollback|commitTransaction|abortTransaction|exec)\s*\(|\b(?:COMMIT|ROLLBACK)\b"
    )
    .unwrap();
}

impl LockKind {
    /// Run this kind's detector over `snippet`
    pub fn detect(&self, snippet: &str, ctx: &AccessContext<'_>) -> Option<Lock> {
        match self {
            LockKind::Explicit => detect_explicit(snippet, ctx),
            LockKind::Monitor => detect_monitor(snippet, ctx),
            LockKind::Atomic => detect_atomic(snippet, ctx),
            LockKind::Transaction => detect_transactional(snippet, ctx),
        }
    }
}

/// Every detector that fires, in [`LockKind::all`] order
pub fn detect_all(snippet: &str, ctx: &AccessContext<'_>) -> Vec<Lock> {
    LockKind::all()
        .iter()
        .filter_map(|kind| kind.detect(snippet, ctx))
        .collect()
}

/// Whether any detector fires
pub fn detect_any(snippet: &str, ctx: &AccessContext<'_>) -> Option<Lock> {
    LockKind::all()
        .iter()
        .find_map(|kind| kind.detect(snippet, ctx))
}

/// Bytes between the `(` at `open` and its `)`; unterminated calls run to the end
fn call_arguments(snippet: &str, open: usize) -> Range<usize> {
    let close = matching_paren(snippet, open).unwrap_or(snippet.len());
    (open + 1).min(close)..close
}

fn has_callback_argument(snippet: &str, open: usize) -> bool {
    let args = &snippet[call_arguments(snippet, open)];
    args.contains("=>") || !find_identifier(args, "function").is_empty()
}

/// Innermost `(` still open at `at`, not looking past the previous `;`
fn enclosing_open(snippet: &str, at: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, byte) in snippet.as_bytes()[..at].iter().enumerate().rev() {
        match byte {
            b')' => depth += 1,
            b'(' if depth == 0 => return Some(i),
            b'(' => depth -= 1,
            b';' => return None,
            _ => {}
        }
    }
    None
}

/// Lines spanned by the call matched at `start..end` and the call around it
fn statement_span(snippet: &str, start: usize, end: usize) -> Range<usize> {
    let own_close = snippet[start..end]
        .rfind('(')
        .and_then(|open| matching_paren(snippet, start + open));
    let outer = enclosing_open(snippet, start);
    let outer_close = outer.and_then(|open| matching_paren(snippet, open));

    let first = line_bounds(snippet, outer.unwrap_or(start)).0;
    let last = [
        Some(line_bounds(snippet, start).1),
        own_close.map(|close| close + 1),
        outer_close.map(|close| close + 1),
    ]
    .into_iter()
    .flatten()
    .max()
    .unwrap_or(snippet.len());
    first..last
}

/// Region held by one explicit acquisition, and whether it is released
///
/// Callback forms hold their argument list. Statement forms hold from the
/// acquire to the first release after it, or to the end of the body.
fn explicit_region(snippet: &str, acquire_end: usize, recv: &str, op: &str) -> (Range<usize>, bool) {
    let open = acquire_end - 1;
    if op == "runExclusive" || has_callback_argument(snippet, open) {
        return (call_arguments(snippet, open), true);
    }

    let tail = &snippet[acquire_end..];
    let named = Regex::new(&format!(
        r"{}\s*\.\s*(?:unlock|release|releaseLock)\s*\(",
        regex::escape(recv)
    ))
    .ok()
    .and_then(|re| re.find(tail).map(|m| m.start()));
    let bare = BARE_RELEASE_RE.find(tail).map(|m| m.start());
    let release = named.into_iter().chain(bare).min();

    let end = release.map_or(snippet.len(), |at| acquire_end + at);
    (acquire_end..end, release.is_some())
}

/// lock/unlock, acquire/release, `runExclusive` and callback-style acquire
pub fn detect_explicit(snippet: &str, ctx: &AccessContext<'_>) -> Option<Lock> {
    EXPLICIT_ACQUIRE_RE.captures_iter(snippet).find_map(|caps| {
        let whole = caps.get(0)?;
        let recv = caps.name("recv")?.as_str();
        let op = caps.name("op")?.as_str();

        let (region, has_release) = explicit_region(snippet, whole.end(), recv, op);
        if !ctx.within(region) {
            return None;
        }

        let scope = determine_scope(recv, line_at(snippet, whole.start()));
        Some(
            Lock::new(LockKind::Explicit, ctx.resource_name, scope, ctx.atom_id)
                .named(recv)
                .released(has_release),
        )
    })
}

/// `synchronized(...)`, `navigator.locks.request('name', ...)`, `withLock(name, ...)`
///
/// Block-structured, so the release is implied.
pub fn detect_monitor(snippet: &str, ctx: &AccessContext<'_>) -> Option<Lock> {
    let (start, name, _) = monitor_sections(snippet)
        .into_iter()
        .find(|(_, _, region)| ctx.within(region.clone()))?;
    let scope = determine_scope(&name, line_at(snippet, start));
    let lock = Lock::new(LockKind::Monitor, ctx.resource_name, scope, ctx.atom_id).released(true);
    Some(if name.is_empty() { lock } else { lock.named(name) })
}

/// Monitor entries as (offset, lock name, guarded region), in code order
fn monitor_sections(snippet: &str) -> Vec<(usize, String, Range<usize>)> {
    let mut found: Vec<(usize, String, Range<usize>)> = Vec::new();

    for caps in SYNCHRONIZED_RE.captures_iter(snippet) {
        let Some(whole) = caps.get(0) else { continue };
        let name = caps.name("name").map_or("", |m| m.as_str()).trim();
        let body = whole.end() + (snippet[whole.end()..].len() - snippet[whole.end()..].trim_start().len());
        let region = match matching_brace(snippet, body) {
            Some(close) => body + 1..close,
            None if snippet.as_bytes().get(body) == Some(&b'{') => body + 1..snippet.len(),
            None => whole.end()..line_bounds(snippet, whole.end()).1,
        };
        found.push((whole.start(), name.to_string(), region));
    }

    for re in [&*LOCKS_REQUEST_RE, &*WITH_LOCK_RE] {
        for caps in re.captures_iter(snippet) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(paren) = whole.as_str().find('(') else { continue };
            let name = caps.name("name").map_or("", |m| m.as_str()).trim();
            found.push((
                whole.start(),
                name.to_string(),
                call_arguments(snippet, whole.start() + paren),
            ));
        }
    }

    found.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    found
}

/// Monitor entries as (offset, lock name), in code order
pub(crate) fn monitor_acquisitions(snippet: &str) -> Vec<(usize, String)> {
    monitor_sections(snippet)
        .into_iter()
        .map(|(start, name, _)| (start, name))
        .collect()
}

/// Explicit acquisitions as (offset, lock name), in code order
pub(crate) fn explicit_acquisitions(snippet: &str) -> Vec<(usize, String)> {
    EXPLICIT_ACQUIRE_RE
        .captures_iter(snippet)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), caps.name("recv")?.as_str().to_string()))
        })
        .collect()
}

/// Last segment of a resource name as it appears in code (`a.ts::f::total` -> `total`)
fn mentioned_name(resource_name: &str) -> &str {
    resource_name.rsplit("::").next().unwrap_or(resource_name)
}

/// First match of `re` whose statement covers the context
fn covering_match<'s>(re: &Regex, snippet: &'s str, ctx: &AccessContext<'_>) -> Option<&'s str> {
    re.captures_iter(snippet).find_map(|caps| {
        let whole = caps.get(0)?;
        ctx.within(statement_span(snippet, whole.start(), whole.end()))
            .then(|| caps.name("name").map(|m| m.as_str()))
            .flatten()
    })
}

/// Atomic primitives; scope is always `operation`
///
/// Generic primitives must mention the resource. Redis counters count for the
/// `cache` resource, `$inc`/`.increment(` for `database`. Only the statement
/// carrying the primitive is guarded.
pub fn detect_atomic(snippet: &str, ctx: &AccessContext<'_>) -> Option<Lock> {
    let name = match ctx.resource_name {
        "cache" => covering_match(&CACHE_ATOMIC_RE, snippet, ctx)?.to_string(),
        "database" => covering_match(&DATABASE_ATOMIC_RE, snippet, ctx)?
            .trim_start_matches('.')
            .trim()
            .trim_end_matches('(')
            .to_string(),
        resource => {
            let mentioned = mentioned_name(resource);
            ATOMIC_PRIMITIVE_RE
                .captures_iter(snippet)
                .find_map(|caps| {
                    let whole = caps.get(0)?;
                    let args_mention = matching_paren(snippet, whole.end() - 1)
                        .map(|close| &snippet[whole.end()..close])
                        .map_or(false, |args| !find_identifier(args, mentioned).is_empty());
                    let line_mention = !find_identifier(line_at(snippet, whole.start()), mentioned).is_empty();
                    let covers = ctx.within(statement_span(snippet, whole.start(), whole.end()));
                    ((args_mention || line_mention) && covers).then(|| caps.name("name").map(|m| m.as_str()))
                })
                .flatten()?
                .split_whitespace()
                .collect::<String>()
        }
    };

    Some(
        Lock::new(LockKind::Atomic, ctx.resource_name, LockScope::Operation, ctx.atom_id)
            .named(name)
            .released(true),
    )
}

/// begin/commit/rollback framing around `database` or `cache` work
///
/// Callback transactions guard their statement. Manual ones guard the lines
/// from the begin to the first commit or rollback, or to the end of the body.
pub fn detect_transactional(snippet: &str, ctx: &AccessContext<'_>) -> Option<Lock> {
    let begin_re: &Regex = match ctx.resource_name {
        "database" => &*DATABASE_BEGIN_RE,
        "cache" => &*CACHE_BEGIN_RE,
        _ => return None,
    };

    begin_re.find_iter(snippet).find_map(|begin| {
        let first = line_bounds(snippet, begin.start()).0;
        let callback = begin.as_str().ends_with('(') && has_callback_argument(snippet, begin.end() - 1);
        let (region, has_release) = if callback {
            (first..call_arguments(snippet, begin.end() - 1).end + 1, true)
        } else {
            let end = TRANSACTION_END_RE
                .find(&snippet[begin.end()..])
                .map(|m| line_bounds(snippet, begin.end() + m.start()).1);
            (first..end.unwrap_or(snippet.len()), end.is_some())
        };
        if !ctx.within(region) {
            return None;
        }

        let name: String = begin
            .as_str()
            .trim_start_matches('.')
            .trim_end_matches('(')
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        Some(
            Lock::new(LockKind::Transaction, ctx.resource_name, LockScope::Transaction, ctx.atom_id)
                .named(name)
                .released(has_release),
        )
    })
}
