//! String heuristics over atom source text
//!
//! Everything here is an approximation over raw JS/TS text: no tokenizer, no
//! AST. Comments and string contents can produce false positives. Callers pin
//! this behavior in tests, so tighten it only together with those fixtures.

use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

lazy_static! {
    static ref COMBINATOR_RE: Regex = Regex::new(
        r"Promise\s*\.\s*(?:all|allSettled|race|any)\s*\(|\.\s*(?:map|forEach|flatMap)\s*\(\s*async\b",
    )
    .unwrap();
    static ref BINDING_RE: Regex = Regex::new(
        r"\b(?:const|let|var)\s+(?:(?P<single>[A-Za-z_$][\w$]*)|\{(?P<object>[^}]*)\}|\[(?P<array>[^\]]*)\])\s*=[^=]",
    )
    .unwrap();
}

const WRITE_OPERATORS: &[&str] = &[
    "**=", "<<=", ">>=", "||=", "&&=", "??=", "+=", "-=", "*=", "/=", "%=", "|=", "&=", "^=",
];

const MUTATING_METHODS: &[&str] = &[
    "push", "pop", "shift", "unshift", "splice", "set", "delete", "clear", "add", "sort", "reverse",
    "fill",
];

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Identifier or dotted member path (`count`, `this.cache`, `$state`)
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {
                    chars.all(is_ident_char)
                }
                _ => false,
            }
        })
}

/// Last segment of a dotted path (`this.cache` -> `cache`)
pub fn bare_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Byte offsets of whole-word occurrences of `name`
///
/// An occurrence preceded by `.` is a member of something else and is skipped.
pub fn find_identifier(text: &str, name: &str) -> Vec<usize> {
    if name.is_empty() {
        return Vec::new();
    }
    text.match_indices(name)
        .filter(|(start, _)| {
            let before_ok = text[..*start]
                .chars()
                .next_back()
                .map_or(true, |c| !is_ident_char(c) && c != '.');
            let after_ok = text[start + name.len()..]
                .chars()
                .next()
                .map_or(true, |c| !is_ident_char(c));
            before_ok && after_ok
        })
        .map(|(start, _)| start)
        .collect()
}

/// Byte range of the line containing `offset` (newline excluded)
pub fn line_bounds(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
    (start, end)
}

pub fn line_at(text: &str, offset: usize) -> &str {
    let (start, end) = line_bounds(text, offset);
    &text[start..end]
}

/// (0-based line index, 1-based character column)
pub fn offset_to_line_col(text: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(text.len());
    let line = text[..offset].matches('\n').count() as u32;
    let (start, _) = line_bounds(text, offset);
    let column = text[start..offset].chars().count() as u32 + 1;
    (line, column)
}

/// Inverse of [`offset_to_line_col`]; `None` when outside the text
pub fn line_col_to_offset(text: &str, line: u32, column: u32) -> Option<usize> {
    let line_start = if line == 0 {
        0
    } else {
        text.match_indices('\n').nth(line as usize - 1).map(|(i, _)| i + 1)?
    };
    let (_, line_end) = line_bounds(text, line_start);
    let target = column.saturating_sub(1) as usize;
    let line_text = &text[line_start..line_end];
    if target > line_text.chars().count() {
        return None;
    }
    let within = line_text
        .char_indices()
        .nth(target)
        .map_or(line_text.len(), |(i, _)| i);
    Some(line_start + within)
}

/// Index of the `)` closing the `(` at `open`, skipping strings and comments
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    matching_close(text, open, b'(', b')')
}

/// Index of the `}` closing the `{` at `open`
pub fn matching_brace(text: &str, open: usize) -> Option<usize> {
    matching_close(text, open, b'{', b'}')
}

fn matching_close(text: &str, open: usize, opener: u8, closer: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&opener) {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b if b == opener => depth += 1,
            b if b == closer => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Argument ranges of fan-out combinators (`Promise.all(...)`, `.map(async ...)`)
///
/// An unterminated call extends to the end of the text.
pub fn concurrent_regions(text: &str) -> Vec<Range<usize>> {
    COMBINATOR_RE
        .find_iter(text)
        .filter_map(|m| {
            let open = m.start() + m.as_str().find('(')?;
            let close = matching_paren(text, open).unwrap_or(text.len());
            Some(open + 1..close)
        })
        .collect()
}

pub fn await_offsets(text: &str) -> Vec<usize> {
    find_identifier(text, "await")
}

/// Body can yield to the event loop
pub fn is_async_code(text: &str) -> bool {
    !find_identifier(text, "await").is_empty()
        || !find_identifier(text, "async").is_empty()
        || text.contains(".then(")
}

/// Names bound by `const|let|var` declarations on a line
pub fn declared_bindings(line: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in BINDING_RE.captures_iter(line) {
        if let Some(single) = caps.name("single") {
            names.push(single.as_str().to_string());
        }
        for list in [caps.name("object"), caps.name("array")].into_iter().flatten() {
            for part in list.as_str().split(',') {
                let part = part.trim().trim_start_matches("...");
                let target = part.rsplit(':').next().unwrap_or(part);
                let target = target.split('=').next().unwrap_or(target).trim();
                if is_identifier(target) && !target.contains('.') {
                    names.push(target.to_string());
                }
            }
        }
    }
    names
}

/// Occurrence of a `len`-byte identifier at `start` is assigned or mutated
pub fn is_write_at(text: &str, start: usize, len: usize) -> bool {
    let after = text[start + len..].trim_start();
    if after.starts_with("++") || after.starts_with("--") {
        return true;
    }
    if WRITE_OPERATORS.iter().any(|op| after.starts_with(op)) {
        return true;
    }
    if after.starts_with('=') && !after.starts_with("==") && !after.starts_with("=>") {
        return true;
    }
    if let Some(member) = after.strip_prefix('.') {
        let method: String = member.chars().take_while(|c| is_ident_char(*c)).collect();
        let rest = member[method.len()..].trim_start();
        if rest.starts_with('(') && MUTATING_METHODS.contains(&method.as_str()) {
            return true;
        }
    }
    let before = text[..start].trim_end();
    before.ends_with("++") || before.ends_with("--") || before.ends_with("delete")
}

/// `name` is incremented/decremented or rebuilt from itself (`n = n + 1`)
pub fn increments(text: &str, name: &str) -> bool {
    find_identifier(text, name).into_iter().any(|start| {
        let after = text[start + name.len()..].trim_start();
        let before = text[..start].trim_end();
        if ["++", "--", "+=", "-="].iter().any(|op| after.starts_with(op))
            || before.ends_with("++")
            || before.ends_with("--")
        {
            return true;
        }
        if after.starts_with('=') && !after.starts_with("==") && !after.starts_with("=>") {
            let rhs = &after[1..];
            let statement_end = rhs.find(|c| c == ';' || c == '\n').unwrap_or(rhs.len());
            let rhs = &rhs[..statement_end];
            return find_identifier(rhs, name).into_iter().any(|pos| {
                let tail = rhs[pos + name.len()..].trim_start();
                tail.starts_with('+') || tail.starts_with('-')
            });
        }
        false
    })
}

/// `let|const|var name` appears in the text
pub fn declares_locally(text: &str, name: &str) -> bool {
    if name.contains('.') {
        return false;
    }
    find_identifier(text, name).into_iter().any(|start| {
        let before = text[..start].trim_end();
        ["let", "const", "var"].iter().any(|kw| {
            before.ends_with(kw)
                && before[..before.len() - kw.len()]
                    .chars()
                    .next_back()
                    .map_or(true, |c| !is_ident_char(c))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("count"));
        assert!(is_identifier("this.cache"));
        assert!(is_identifier("$state"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a..b"));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn test_find_identifier_word_boundaries() {
        let text = "count = counter + this.count + count";
        assert_eq!(find_identifier(text, "count"), vec![0, 31]);
        assert_eq!(find_identifier(text, "this.count"), vec![18]);
    }

    #[test]
    fn test_line_col_roundtrip() {
        let text = "a\nbb = 1\n  ccc";
        let offset = text.find("ccc").unwrap();
        assert_eq!(offset_to_line_col(text, offset), (2, 3));
        assert_eq!(line_col_to_offset(text, 2, 3), Some(offset));
        assert_eq!(line_col_to_offset(text, 7, 1), None);
    }

    #[test]
    fn test_matching_paren_skips_strings() {
        let text = "f(a, ')', `(`, g(b))";
        assert_eq!(matching_paren(text, 1), Some(text.len() - 1));
        assert_eq!(matching_paren(text, 0), None);
    }

    #[test]
    fn test_matching_brace_skips_nested_blocks() {
        let text = "synchronized (this) { if (a) { b('}'); } c++; }\nd++;";
        let open = text.find('{').unwrap();
        assert_eq!(matching_brace(text, open), Some(text.find("\n").unwrap() - 1));
        assert_eq!(matching_brace(text, 0), None);
    }

    #[test]
    fn test_concurrent_regions() {
        let text = "await Promise.all([load(a), save(b)]);\nawait next();";
        let regions = concurrent_regions(text);
        assert_eq!(regions.len(), 1);
        let inside = text.find("save").unwrap();
        let outside = text.find("next").unwrap();
        assert!(regions[0].contains(&inside));
        assert!(!regions[0].contains(&outside));
    }

    #[test]
    fn test_async_map_region() {
        let text = "ids.forEach(async (id) => { total += await price(id); });";
        assert_eq!(concurrent_regions(text).len(), 1);
    }

    #[test]
    fn test_declared_bindings() {
        assert_eq!(declared_bindings("const user = await db.find(id);"), vec!["user"]);
        assert_eq!(
            declared_bindings("let { a, b: renamed, ...rest } = obj;"),
            vec!["a", "renamed", "rest"]
        );
        assert_eq!(declared_bindings("const [x, y = 2] = pair;"), vec!["x", "y"]);
        assert!(declared_bindings("if (a == b) {}").is_empty());
    }

    #[test]
    fn test_is_write_at() {
        let cases = [
            ("count = 1", true),
            ("count == 1", false),
            ("count += 2", true),
            ("count++", true),
            ("++count", true),
            ("return count", false),
            ("count.set(k, v)", true),
            ("count.get(k)", false),
            ("count => 1", false),
        ];
        for (text, expected) in cases {
            let start = find_identifier(text, "count")[0];
            assert_eq!(is_write_at(text, start, 5), expected, "{text}");
        }
    }

    #[test]
    fn test_increments() {
        assert!(increments("hits++;", "hits"));
        assert!(increments("hits += 1", "hits"));
        assert!(increments("hits = hits + 1;", "hits"));
        assert!(!increments("hits = 0;", "hits"));
        assert!(!increments("total = hits + 1;", "hits"));
    }

    #[test]
    fn test_declares_locally() {
        assert!(declares_locally("const cache = new Map();", "cache"));
        assert!(declares_locally("for (let i = 0; i < n; i++) {}", "i"));
        assert!(!declares_locally("cache = new Map();", "cache"));
        assert!(!declares_locally("constcache = 1", "cache"));
    }

    #[test]
    fn test_is_async_code() {
        assert!(is_async_code("const a = await b();"));
        assert!(is_async_code("load().then(done)"));
        assert!(!is_async_code("count++;"));
    }
}
