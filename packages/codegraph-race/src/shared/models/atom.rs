//! Atom: function/method-level unit produced by the upstream extractor
//!
//! Read-only for this crate. `start_line` is the 1-based line of the first line
//! of `code` in its file; access positions are reported relative to the file.

use serde::{Deserialize, Serialize};

/// Where a closure variable is declared, when the extractor knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableOrigin {
    /// Module-level binding
    Module,
    /// Binding of an enclosing function, shared by sibling closures
    Enclosing,
    /// Declared inside the atom itself
    Local,
}

/// Read/write marker on a closure variable occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceKind {
    Read,
    Write,
}

/// One occurrence of a closure variable (file-relative position)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableOccurrence {
    pub kind: OccurrenceKind,
    pub line: u32,
    pub column: u32,
}

/// Variable captured by an atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureVariable {
    pub name: String,
    #[serde(default)]
    pub origin: Option<VariableOrigin>,
    /// Empty when the extractor did not mark occurrences; the code text is scanned instead
    #[serde(default)]
    pub occurrences: Vec<VariableOccurrence>,
}

impl ClosureVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: None,
            occurrences: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: VariableOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_occurrence(mut self, kind: OccurrenceKind, line: u32, column: u32) -> Self {
        self.occurrences.push(VariableOccurrence { kind, line, column });
        self
    }
}

/// Function/method-level unit of analyzed code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default = "default_start_line")]
    pub start_line: u32,
    pub code: String,
    /// Callee identifiers (atom ids, atom names, or external call targets)
    #[serde(default)]
    pub calls: Vec<String>,
    /// Caller atom identifiers
    #[serde(default)]
    pub called_by: Vec<String>,
    #[serde(default)]
    pub closure_variables: Vec<ClosureVariable>,
}

fn default_start_line() -> u32 {
    1
}

impl Atom {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        let id = id.into();
        let name = short_name(&id).to_string();
        Self {
            id,
            name,
            file_path: String::new(),
            start_line: 1,
            code: code.into(),
            calls: Vec::new(),
            called_by: Vec::new(),
            closure_variables: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn with_start_line(mut self, line: u32) -> Self {
        self.start_line = line.max(1);
        self
    }

    pub fn with_calls<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.calls.extend(calls.into_iter().map(Into::into));
        self
    }

    pub fn with_called_by<I, S>(mut self, callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.called_by.extend(callers.into_iter().map(Into::into));
        self
    }

    pub fn with_closure_variable(mut self, var: ClosureVariable) -> Self {
        self.closure_variables.push(var);
        self
    }

    /// Name used to find call sites of this atom in caller code
    pub fn call_name(&self) -> &str {
        if self.name.is_empty() {
            short_name(&self.id)
        } else {
            &self.name
        }
    }
}

/// Last segment of an atom id (`src/a.ts::Cache.get` -> `get`)
fn short_name(id: &str) -> &str {
    id.rsplit(|c| c == ':' || c == '.' || c == '#' || c == '/')
        .find(|s| !s.is_empty())
        .unwrap_or(id)
}
