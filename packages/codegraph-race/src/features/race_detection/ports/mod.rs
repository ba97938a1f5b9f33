pub mod atom_lookup_port;
pub mod race_analyzer_port;

pub use atom_lookup_port::*;
pub use race_analyzer_port::*;
