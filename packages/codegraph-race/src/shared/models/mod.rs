//! Input models handed over by the extractor
pub mod atom;
pub mod project;

pub use atom::*;
pub use project::*;
