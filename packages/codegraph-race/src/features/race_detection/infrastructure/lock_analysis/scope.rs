/// Lock scope classifier
///
/// Pure keyword heuristic over the lock name and its surrounding text. Not an
/// AST analysis: `static`/`global` in a comment still reads as Global.
use crate::features::race_detection::domain::LockScope;
use crate::shared::code_text::find_identifier;

const GLOBAL_KEYWORDS: &[&str] = &["static", "global", "globalThis", "window"];
const RECEIVER_PREFIXES: &[&str] = &["this.", "self."];

/// `global` for static/global keywords, `instance` for receiver-qualified
/// locks (`this.`/`self.`), otherwise `local`
pub fn determine_scope(lock_name: &str, text: &str) -> LockScope {
    if GLOBAL_KEYWORDS
        .iter()
        .any(|kw| !find_identifier(text, kw).is_empty())
    {
        return LockScope::Global;
    }
    if RECEIVER_PREFIXES
        .iter()
        .any(|prefix| lock_name.starts_with(prefix) || text.contains(prefix))
    {
        return LockScope::Instance;
    }
    LockScope::Local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_classifications() {
        assert_eq!(determine_scope("m", "static mutex lock"), LockScope::Global);
        assert_eq!(determine_scope("m", "this.lock.acquire()"), LockScope::Instance);
        assert_eq!(determine_scope("m", "const lock = new Mutex()"), LockScope::Local);
    }

    #[test]
    fn test_receiver_qualified_name() {
        assert_eq!(determine_scope("this.mutex", "await mutex.runExclusive(f)"), LockScope::Instance);
        assert_eq!(determine_scope("self.lock", ""), LockScope::Instance);
    }

    #[test]
    fn test_global_wins_over_instance() {
        assert_eq!(determine_scope("m", "globalThis.lock = this.lock"), LockScope::Global);
    }

    #[test]
    fn test_keyword_must_be_whole_word() {
        assert_eq!(determine_scope("m", "const staticLock = new Mutex()"), LockScope::Local);
    }
}
