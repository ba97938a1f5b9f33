//! Test data builders

use chrono::{DateTime, TimeZone, Utc};
use codegraph_race::shared::models::{Atom, ClosureVariable, Module, ProjectModel, SourceFile, VariableOrigin};

/// Fixed timestamp so reports compare byte-for-byte
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Atom with a module-level closure variable
pub fn module_atom(id: &str, code: &str, var: &str) -> Atom {
    Atom::new(id, code).with_closure_variable(ClosureVariable::new(var).with_origin(VariableOrigin::Module))
}

/// Builder for multi-file projects
#[derive(Debug, Default)]
pub struct ProjectBuilder {
    files: Vec<SourceFile>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; atoms get the file path
    pub fn file(mut self, path: &str, atoms: Vec<Atom>) -> Self {
        let atoms = atoms.into_iter().map(|a| a.with_file(path)).collect();
        self.files.push(SourceFile {
            path: path.to_string(),
            atoms,
        });
        self
    }

    pub fn build(self) -> ProjectModel {
        ProjectModel {
            modules: vec![Module {
                name: "app".to_string(),
                files: self.files,
            }],
        }
    }
}
