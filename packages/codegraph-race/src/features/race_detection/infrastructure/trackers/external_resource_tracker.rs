/// External resource tracker
///
/// Finds calls into databases, queues, filesystems and caches by the names on
/// the receiver chain (`db.users.insert(...)`, `redis.get(...)`, `fs.writeFile(...)`).
/// The method verb decides read vs write; for `query`/`execute`-style calls the
/// SQL verb in the arguments decides. Calls that fit no category or verb are
/// omitted. Resource name is the category, scope always Global.
use super::{atom_position, AccessTracker};
use crate::features::race_detection::domain::{
    number_accesses, Access, AccessKind, AccessScope, TrackerKind,
};
use crate::shared::code_text::{is_ident_char, matching_paren};
use crate::shared::models::Atom;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref METHOD_CALL_RE: Regex =
        Regex::new(r"\.\s*(?P<method>[A-Za-z_$][\w$]*)\s*\(").unwrap();
    static ref BARE_FS_CALL_RE: Regex = Regex::new(
        r"\b(?P<method>readFile|readFileSync|writeFile|writeFileSync|appendFile|appendFileSync|unlink|unlinkSync|mkdir|mkdirSync|rmSync|rename|renameSync|readdir|readdirSync|statSync|existsSync|createReadStream|createWriteStream)\s*\("
    )
    .unwrap();
    static ref SQL_VERB_RE: Regex = Regex::new(
        r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|UPSERT|MERGE|REPLACE|CREATE|DROP|ALTER|TRUNCATE)\b"
    )
    .unwrap();
}

/// External resource category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Database,
    Queue,
    Filesystem,
    Cache,
}

impl ResourceCategory {
    /// Classification order: the first category with a keyword hit wins
    const ORDER: [ResourceCategory; 4] = [
        ResourceCategory::Cache,
        ResourceCategory::Queue,
        ResourceCategory::Filesystem,
        ResourceCategory::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Database => "database",
            ResourceCategory::Queue => "queue",
            ResourceCategory::Filesystem => "filesystem",
            ResourceCategory::Cache => "cache",
        }
    }

    /// Tokens that must equal a receiver token
    fn exact_keywords(&self) -> &'static [&'static str] {
        match self {
            ResourceCategory::Database => &["db", "pg", "sql", "orm", "knex", "pool", "table"],
            ResourceCategory::Queue => &["mq", "sqs", "sns", "bull", "nats", "topic", "channel"],
            ResourceCategory::Filesystem => &["fs", "fse", "s3", "disk", "file", "files"],
            ResourceCategory::Cache => &["kv", "lru", "memo"],
        }
    }

    /// Substrings matched anywhere in a receiver token
    fn contained_keywords(&self) -> &'static [&'static str] {
        match self {
            ResourceCategory::Database => &[
                "database", "mongo", "prisma", "sequelize", "typeorm", "mysql", "sqlite",
                "postgres", "repository", "collection", "model", "dynamo", "firestore",
            ],
            ResourceCategory::Queue => &[
                "queue", "amqp", "rabbit", "kafka", "producer", "consumer", "pubsub", "broker",
            ],
            ResourceCategory::Filesystem => &["fspromises", "filesystem", "bucket", "storage"],
            ResourceCategory::Cache => &["cache", "redis", "memcache", "session"],
        }
    }

    /// Category of a receiver chain (`this.userRepository`, `db.collection('orders')`)
    pub fn classify(receiver: &str) -> Option<ResourceCategory> {
        let lowered = receiver.to_ascii_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        Self::ORDER.into_iter().find(|category| {
            tokens.iter().any(|token| {
                category.exact_keywords().contains(token)
                    || category
                        .contained_keywords()
                        .iter()
                        .any(|kw| token.contains(kw))
            })
        })
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const READ_VERBS: &[&str] = &[
    "get", "find", "fetch", "read", "load", "select", "count", "exists", "list", "scan", "peek",
    "stat", "search", "lookup", "aggregate", "keys", "has", "consume", "receive", "hget", "mget",
    "ttl",
];

const WRITE_VERBS: &[&str] = &[
    "set", "put", "insert", "update", "upsert", "delete", "del", "remove", "save", "create",
    "write", "append", "push", "publish", "send", "enqueue", "dequeue", "add", "incr", "decr",
    "destroy", "truncate", "drop", "unlink", "mkdir", "rm", "rename", "replace", "patch", "store",
    "persist", "produce", "hset", "mset", "expire", "flush", "clear", "pop", "lpush", "rpush",
    "lpop", "rpop", "ack", "copy", "emit",
];

const SQL_METHODS: &[&str] = &["query", "execute", "exec", "raw", "run", "queryraw", "executeraw"];

/// Read/write classification of a method call
///
/// `None` means the verb is not recognized and the call is omitted.
pub fn classify_method(method: &str, args: &str) -> Option<AccessKind> {
    let method = method.to_ascii_lowercase();

    if SQL_METHODS.contains(&method.as_str()) {
        let verb = SQL_VERB_RE.captures(args)?.get(1)?.as_str().to_ascii_uppercase();
        return Some(if verb == "SELECT" {
            AccessKind::Read
        } else {
            AccessKind::Write
        });
    }

    // createReadStream reads despite the create- prefix
    if method.starts_with("create") && method.contains("read") {
        return Some(AccessKind::Read);
    }
    if READ_VERBS.iter().any(|verb| method.starts_with(verb)) {
        return Some(AccessKind::Read);
    }
    if WRITE_VERBS.iter().any(|verb| method.starts_with(verb)) {
        return Some(AccessKind::Write);
    }
    None
}

/// Receiver chain ending right before the `.` at `dot`, with its start offset
///
/// Walks back over identifiers, dots, call parentheses and line breaks inside a
/// fluent chain.
fn receiver_chain(code: &str, dot: usize) -> Option<(usize, &str)> {
    let head = &code[..dot];
    let end = head.len();
    let mut start = end;

    loop {
        match head[..start].chars().next_back() {
            Some(c) if is_ident_char(c) || c == '.' => start -= c.len_utf8(),
            Some(')') => start = matching_open_paren(head, start - 1)?,
            Some(c) if c.is_whitespace() => {
                let trimmed = head[..start].trim_end();
                if start == end || head[start..].starts_with('.') || trimmed.ends_with('.') {
                    start = trimmed.len();
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    let chain = head[start..end].trim();
    if chain.is_empty() || chain.starts_with('.') {
        None
    } else {
        Some((start, chain))
    }
}

fn matching_open_paren(text: &str, close: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn call_arguments(code: &str, open: usize) -> &str {
    let close = matching_paren(code, open).unwrap_or(code.len());
    &code[(open + 1).min(close)..close]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalResourceTracker;

impl ExternalResourceTracker {
    fn access(atom: &Atom, category: ResourceCategory, kind: AccessKind, line: u32, column: u32) -> Access {
        Access::new(&atom.id, category.as_str(), kind, TrackerKind::ExternalResource)
            .with_scope(AccessScope::Global)
            .at(line, column)
    }

    fn from_code(atom: &Atom) -> Vec<Access> {
        let code = &atom.code;
        let mut accesses = Vec::new();

        for caps in METHOD_CALL_RE.captures_iter(code) {
            let (Some(whole), Some(method)) = (caps.get(0), caps.name("method")) else {
                continue;
            };
            let Some((start, receiver)) = receiver_chain(code, whole.start()) else {
                continue;
            };
            let Some(category) = ResourceCategory::classify(receiver) else {
                continue;
            };
            let open = whole.end() - 1;
            let Some(kind) = classify_method(method.as_str(), call_arguments(code, open)) else {
                continue;
            };
            let (line, column) = atom_position(atom, start);
            accesses.push(Self::access(atom, category, kind, line, column));
        }

        for caps in BARE_FS_CALL_RE.captures_iter(code) {
            let Some(method) = caps.name("method") else {
                continue;
            };
            let preceded_by_dot = code[..method.start()].trim_end().ends_with('.');
            if preceded_by_dot {
                continue;
            }
            if let Some(kind) = classify_method(method.as_str(), "") {
                let (line, column) = atom_position(atom, method.start());
                accesses.push(Self::access(atom, ResourceCategory::Filesystem, kind, line, column));
            }
        }

        accesses
    }

    /// `calls` entries whose call text is absent from the code (attributed to the atom start)
    fn from_call_edges(atom: &Atom) -> Vec<Access> {
        atom.calls
            .iter()
            .filter(|call| !atom.code.contains(call.as_str()))
            .filter_map(|call| {
                let (receiver, method) = call.rsplit_once('.')?;
                let category = ResourceCategory::classify(receiver)?;
                let kind = classify_method(method, "")?;
                Some(Self::access(atom, category, kind, atom.start_line.max(1), 1))
            })
            .collect()
    }
}

impl AccessTracker for ExternalResourceTracker {
    fn kind(&self) -> TrackerKind {
        TrackerKind::ExternalResource
    }

    fn collect(&self, atom: &Atom) -> Vec<Access> {
        let mut accesses = Self::from_code(atom);
        accesses.extend(Self::from_call_edges(atom));
        accesses.sort_by(|a, b| {
            (a.source_position, &a.resource_name, a.kind).cmp(&(
                b.source_position,
                &b.resource_name,
                b.kind,
            ))
        });
        accesses.dedup_by(|a, b| {
            a.source_position == b.source_position
                && a.resource_name == b.resource_name
                && a.kind == b.kind
        });
        number_accesses(&atom.id, TrackerKind::ExternalResource, &mut accesses);
        accesses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_receivers() {
        let cases = [
            ("db", Some(ResourceCategory::Database)),
            ("this.userRepository", Some(ResourceCategory::Database)),
            ("db.collection('orders')", Some(ResourceCategory::Database)),
            ("redisClient", Some(ResourceCategory::Cache)),
            ("this.cache", Some(ResourceCategory::Cache)),
            ("orderQueue", Some(ResourceCategory::Queue)),
            ("kafkaProducer", Some(ResourceCategory::Queue)),
            ("fs", Some(ResourceCategory::Filesystem)),
            ("fs.promises", Some(ResourceCategory::Filesystem)),
            ("console", None),
            ("fsm", None),
            ("this.items", None),
        ];
        for (receiver, expected) in cases {
            assert_eq!(ResourceCategory::classify(receiver), expected, "{receiver}");
        }
    }

    #[test]
    fn test_classify_methods() {
        assert_eq!(classify_method("findOne", ""), Some(AccessKind::Read));
        assert_eq!(classify_method("insertMany", ""), Some(AccessKind::Write));
        assert_eq!(classify_method("createReadStream", ""), Some(AccessKind::Read));
        assert_eq!(classify_method("query", "'SELECT * FROM t'"), Some(AccessKind::Read));
        assert_eq!(classify_method("query", "`update t set a = 1`"), Some(AccessKind::Write));
        assert_eq!(classify_method("query", "sql"), None);
        assert_eq!(classify_method("connect", ""), None);
    }

    #[test]
    fn test_collect_from_code() {
        let atom = Atom::new(
            "orders::place",
            "async function place(o) {\n  const stock = await db.stock.findOne({ id: o.id });\n  await db.stock.update({ id: o.id }, { qty: stock.qty - 1 });\n  await queue.publish('placed', o);\n}",
        );
        let accesses = ExternalResourceTracker.collect(&atom);
        let summary: Vec<_> = accesses
            .iter()
            .map(|a| (a.resource_name.as_str(), a.kind, a.source_position.line))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("database", AccessKind::Read, 2),
                ("database", AccessKind::Write, 3),
                ("queue", AccessKind::Write, 4),
            ]
        );
        assert!(accesses.iter().all(|a| a.scope == AccessScope::Global));
    }

    #[test]
    fn test_fluent_chain_across_lines() {
        let atom = Atom::new(
            "a",
            "await mongo\n  .collection('users')\n  .insertOne(user);",
        );
        let accesses = ExternalResourceTracker.collect(&atom);
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].kind, AccessKind::Write);
        assert_eq!(accesses[0].resource_name, "database");
        assert_eq!(accesses[0].source_position.line, 1);
    }

    #[test]
    fn test_bare_filesystem_calls() {
        let atom = Atom::new("a", "writeFileSync(path, data);\nfs.readFileSync(path);");
        let kinds: Vec<_> = ExternalResourceTracker
            .collect(&atom)
            .into_iter()
            .map(|a| (a.resource_name, a.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("filesystem".to_string(), AccessKind::Write),
                ("filesystem".to_string(), AccessKind::Read),
            ]
        );
    }

    #[test]
    fn test_call_edges_missing_from_code() {
        let atom = Atom::new("a", "await helper();")
            .with_start_line(7)
            .with_calls(["helper", "cache.set"]);
        let accesses = ExternalResourceTracker.collect(&atom);
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].resource_name, "cache");
        assert_eq!(accesses[0].source_position.line, 7);
    }
}
